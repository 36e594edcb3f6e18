//! Built-in journey suite

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use storefront_harness::login::{ACCOUNT_HEADING, ACCOUNT_HEADING_TEXT};
use storefront_harness::{
    CartPage, HarnessError, HarnessResult, ProductPage, RegistrationIdentity, ResilientRegistrar,
    TestContext,
};

/// Product put in the cart by the price journey
pub const CART_PRODUCT: &str = "MacBook Pro";

/// Storefront id of [`CART_PRODUCT`]
pub const CART_PRODUCT_ID: u32 = 45;

/// Stepper presses on top of the default quantity of one
pub const EXTRA_UNITS: u32 = 4;

/// Journey body
pub type JourneyFn = fn(TestContext) -> LocalBoxFuture<'static, HarnessResult<()>>;

/// A named journey
#[derive(Debug, Clone, Copy)]
pub struct Journey {
    /// Test name, also used for trace file names
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Body
    pub run: JourneyFn,
}

/// Every built-in journey in run order
#[must_use]
pub fn all() -> Vec<Journey> {
    vec![
        Journey {
            name: "home_page_loads",
            description: "Storefront home page opens at the base URL",
            run: |ctx| home_page_loads(ctx).boxed_local(),
        },
        Journey {
            name: "login_with_api_user",
            description: "Account registered over HTTP can log in through the UI",
            run: |ctx| login_with_api_user(ctx).boxed_local(),
        },
        Journey {
            name: "cart_total_matches_quantity",
            description: "Cart line total equals unit price times quantity",
            run: |ctx| cart_total_matches_quantity(ctx).boxed_local(),
        },
    ]
}

/// Journeys whose name contains `filter`
#[must_use]
pub fn select(filter: Option<&str>) -> Vec<Journey> {
    all()
        .into_iter()
        .filter(|j| filter.map_or(true, |f| j.name.contains(f)))
        .collect()
}

/// Navigate to the base URL and check the page landed there
pub async fn home_page_loads(ctx: TestContext) -> HarnessResult<()> {
    ctx.step("Act: Navigate to home page");
    ctx.page().goto(ctx.base_url()).await?;

    ctx.step("Assert: Home page is open");
    let landed = ctx.page().url().await?;
    let expected = ctx.base_url().trim_end_matches('/');
    if !landed.starts_with(expected) {
        return Err(HarnessError::assertion(format!(
            "expected to land on {expected}, got {landed}"
        )));
    }
    Ok(())
}

/// Register an account through the HTTP form, then log in with it in the UI
pub async fn login_with_api_user(ctx: TestContext) -> HarnessResult<()> {
    ctx.step("Arrange: Create user via API");
    let mut identity = RegistrationIdentity::generate();
    let receipt = ResilientRegistrar::http(ctx.base_url())?
        .register(&mut identity)
        .await?;
    tracing::info!(
        first_name = %identity.first_name,
        last_name = %identity.last_name,
        email = %receipt.email,
        "registered identity for login"
    );
    ctx.parameter("Email", identity.email.clone());
    ctx.parameter("First Name", identity.first_name.clone());
    ctx.parameter("Last Name", identity.last_name.clone());

    let login = ctx.login_page();
    ctx.step("Act: Navigate to login page");
    login.open().await?;

    ctx.step("Act: Login via UI");
    login.login(&identity.email, &identity.password).await?;

    ctx.step("Assert: Login succeeded");
    ctx.page()
        .probe(ACCOUNT_HEADING, Some(ACCOUNT_HEADING_TEXT))
        .await?
        .ok_or_else(|| {
            HarnessError::assertion(format!("'{ACCOUNT_HEADING_TEXT}' heading is not visible"))
        })?;
    Ok(())
}

/// Put five units of a product in the cart and check the line total
pub async fn cart_total_matches_quantity(ctx: TestContext) -> HarnessResult<()> {
    ctx.step("Act: Navigate to home page");
    ctx.page().goto(ctx.base_url()).await?;

    ctx.step("Act: Scan home page accessibility");
    ctx.check_accessibility().await;

    let product = ProductPage::new(ctx.page(), ctx.base_url(), CART_PRODUCT_ID, CART_PRODUCT);
    ctx.parameter("Product", CART_PRODUCT);
    ctx.step("Act: Open product page");
    product.open().await?;

    ctx.step("Act: Increase quantity");
    product.increase_quantity(EXTRA_UNITS).await?;

    ctx.step("Act: Add to cart");
    product.add_to_cart().await?;

    let cart = CartPage::new(ctx.page(), ctx.base_url());
    ctx.step("Act: View cart");
    cart.open().await?;

    ctx.step("Assert: Line total equals unit price times quantity");
    let line = cart.line(CART_PRODUCT).await?;
    ctx.parameter("Unit Price", line.unit_price.to_string());
    ctx.parameter("Quantity", line.quantity.to_string());
    ctx.parameter("Line Total", line.total.to_string());
    line.verify()?;

    ctx.step("Cleanup: Remove item");
    cart.remove_and_confirm_empty().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storefront_harness::mock::MockEngine;
    use std::time::Duration;
    use storefront_harness::cart::{CART_CONTENT, CART_NOTIFICATION, EMPTY_CART_TEXT};
    use storefront_harness::{Harness, ProcessEnv, SuiteConfig, TestStatus};

    fn mock_config(dir: &std::path::Path) -> SuiteConfig {
        SuiteConfig::new()
            .with_headless(true)
            .with_base_url("https://shop.example/")
            .with_traces_dir(dir.join("traces"))
    }

    fn storefront_with_cart(total: &str) -> MockEngine {
        MockEngine::new()
            .with_signal(
                CART_NOTIFICATION,
                "Success: You have added MacBook Pro to your shopping cart!",
                Duration::ZERO,
            )
            .with_signal(CART_CONTENT, EMPTY_CART_TEXT, Duration::ZERO)
            .with_function_result("accessibilityAudit", serde_json::json!([]))
            .with_function_result(
                "cartLine",
                serde_json::json!({"unit": "$2,000.00", "quantity": "5", "total": total}),
            )
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_names_are_unique() {
            let names: Vec<_> = all().iter().map(|j| j.name).collect();
            let mut deduped = names.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(names.len(), deduped.len());
        }

        #[test]
        fn test_filter() {
            assert_eq!(select(None).len(), all().len());
            let login = select(Some("login"));
            assert_eq!(login.len(), 1);
            assert_eq!(login[0].name, "login_with_api_user");
            assert!(select(Some("checkout")).is_empty());
        }
    }

    mod journey_tests {
        use super::*;

        #[tokio::test]
        async fn test_home_page_journey_on_mock() {
            let dir = tempfile::tempdir().unwrap();
            let config = SuiteConfig::new()
                .with_headless(true)
                .with_base_url("https://shop.example/")
                .with_traces_dir(dir.path().join("traces"));
            let engine = MockEngine::new();
            let mut harness = Harness::launch(config, None, &ProcessEnv::new(), Arc::new(engine.clone()))
                .await
                .unwrap();

            let journey = select(Some("home")).remove(0);
            let outcome = harness.run(journey.name, journey.run).await;
            assert!(outcome.is_success(), "{outcome:?}");
            assert!(engine.was_called("goto:https://shop.example/"));

            let reporter = harness.finish().await;
            assert_eq!(reporter.results()[0].steps.len(), 2);
        }

        #[tokio::test]
        async fn test_cart_journey_passes_when_total_matches() {
            let dir = tempfile::tempdir().unwrap();
            let engine = storefront_with_cart("$10,000.00");
            let mut harness = Harness::launch(mock_config(dir.path()), None, &ProcessEnv::new(), Arc::new(engine.clone()))
                .await
                .unwrap();

            let journey = select(Some("cart")).remove(0);
            let outcome = harness.run(journey.name, journey.run).await;
            assert!(outcome.is_success(), "{outcome:?}");
            assert_eq!(
                engine.call_count("click:button[aria-label='Increase quantity']"),
                EXTRA_UNITS as usize
            );
            assert!(engine.was_called("click:button[title='Remove']"));

            let reporter = harness.finish().await;
            assert_eq!(reporter.results()[0].parameter("Line Total"), Some("10000.00"));
            assert!(!dir.path().join("traces").exists());
        }

        #[tokio::test]
        async fn test_price_mismatch_fails_and_keeps_trace() {
            let dir = tempfile::tempdir().unwrap();
            let engine = storefront_with_cart("$9,000.00");
            let mut harness = Harness::launch(mock_config(dir.path()), None, &ProcessEnv::new(), Arc::new(engine.clone()))
                .await
                .unwrap();

            let journey = select(Some("cart")).remove(0);
            let outcome = harness.run(journey.name, journey.run).await;
            assert_eq!(
                outcome.failure_message(),
                Some("Price calculation failed for MacBook Pro! Expected: 10000.00 Actual: 9000.00")
            );
            assert!(engine.was_called("screenshot:full"));
            assert!(!engine.was_called("click:button[title='Remove']"));

            let reporter = harness.finish().await;
            let entry = &reporter.results()[0];
            assert_eq!(entry.status, TestStatus::Failed);
            assert_eq!(entry.attachments.len(), 2);
            let traces: Vec<_> = std::fs::read_dir(dir.path().join("traces"))
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect();
            assert_eq!(traces.len(), 1);
            assert!(traces[0].starts_with("cart_total_matches_quantity_"));
        }
    }
}
