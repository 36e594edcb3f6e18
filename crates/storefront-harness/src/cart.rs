//! Product detail and shopping cart pages.
//!
//! The cart check is a business rule rather than a UI check: the line total
//! shown for a product must equal its unit price times its quantity. Prices
//! are handled as whole cents so the comparison is exact.

use crate::engine::Page;
use crate::race::{OutcomeRace, SelectorSignal};
use crate::result::{HarnessError, HarnessResult};
use serde::Deserialize;
use std::fmt;

/// Cart route, relative to the storefront base URL
pub const CART_ROUTE: &str = "index.php?route=checkout/cart";

/// Product route prefix; the product id is appended
pub const PRODUCT_ROUTE: &str = "index.php?route=product/product&product_id=";

/// Quantity stepper on the product page
pub const INCREASE_QUANTITY_BUTTON: &str = "button[aria-label='Increase quantity']";

/// Add-to-cart button on the product page
pub const ADD_TO_CART_BUTTON: &str = "button.button-cart";

/// Notification shown after adding a product
pub const CART_NOTIFICATION: &str = "#notification-box-top .toast-body";

/// Remove button of a cart line
pub const REMOVE_BUTTON: &str = "button[title='Remove']";

/// Main content area of the cart page
pub const CART_CONTENT: &str = "#content";

/// Text of [`CART_CONTENT`] once the cart is empty
pub const EMPTY_CART_TEXT: &str = "Your shopping cart is empty!";

/// Application error banner
pub const ERROR_BANNER: &str = ".alert-danger";

/// Reads the last cart row mentioning the product: unit price (5th cell),
/// quantity input and line total (6th cell). `null` when no row matches.
pub const CART_LINE_SCRIPT: &str = r#"function cartLine(product) {
  const rows = Array.from(document.querySelectorAll('#content table tbody tr'))
    .filter((row) => row.innerText.includes(product));
  const row = rows[rows.length - 1];
  if (!row) return null;
  const cells = row.querySelectorAll('td');
  const quantity = row.querySelector("input[type='text']");
  return {
    unit: cells[4] ? cells[4].innerText : '',
    quantity: quantity ? quantity.value : '',
    total: cells[5] ? cells[5].innerText : '',
  };
}"#;

/// An amount of money in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Amount from whole cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole cents
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Parse displayed price text such as `$2,000.00`. Currency symbols and
    /// thousands separators are ignored; at most two decimals are accepted.
    pub fn parse(text: &str) -> HarnessResult<Self> {
        let invalid = || HarnessError::assertion(format!("'{}' is not a price", text.trim()));
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let (whole, fraction) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.len() > 2 || fraction.contains('.') {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// This amount times `quantity`
    #[must_use]
    pub const fn times(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[derive(Debug, Deserialize)]
struct RawCartLine {
    unit: String,
    quantity: String,
    total: String,
}

/// One product line of the cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Product name
    pub product: String,
    /// Unit price
    pub unit_price: Money,
    /// Quantity
    pub quantity: u32,
    /// Line total as displayed
    pub total: Money,
}

impl CartLine {
    /// Unit price times quantity
    #[must_use]
    pub fn expected_total(&self) -> Option<Money> {
        self.unit_price.times(self.quantity)
    }

    /// Fail with [`HarnessError::PriceMismatch`] unless the displayed total
    /// equals unit price times quantity
    pub fn verify(&self) -> HarnessResult<()> {
        tracing::info!(
            product = %self.product,
            unit = %self.unit_price,
            quantity = self.quantity,
            total = %self.total,
            "verifying price calculation"
        );
        let expected = self.expected_total().ok_or_else(|| {
            HarnessError::assertion(format!("{} x {} overflows", self.unit_price, self.quantity))
        })?;
        if expected != self.total {
            tracing::error!(product = %self.product, %expected, actual = %self.total, "price calculation failed");
            return Err(HarnessError::PriceMismatch {
                product: self.product.clone(),
                expected,
                actual: self.total,
            });
        }
        tracing::info!(product = %self.product, "price calculation verified");
        Ok(())
    }
}

/// Page object for a product detail page
#[derive(Debug)]
pub struct ProductPage<'a> {
    page: &'a dyn Page,
    base_url: String,
    product_id: u32,
    name: String,
    race: OutcomeRace,
}

impl<'a> ProductPage<'a> {
    /// Product `product_id` named `name` on the storefront at `base_url`
    #[must_use]
    pub fn new(page: &'a dyn Page, base_url: impl Into<String>, product_id: u32, name: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            product_id,
            name: name.into(),
            race: OutcomeRace::new(),
        }
    }

    /// Absolute URL of the product page
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}/{PRODUCT_ROUTE}{}", self.base_url.trim_end_matches('/'), self.product_id)
    }

    /// Navigate to the product page
    pub async fn open(&self) -> HarnessResult<()> {
        self.page.goto(&self.url()).await
    }

    /// Press the quantity stepper `times` times
    pub async fn increase_quantity(&self, times: u32) -> HarnessResult<()> {
        tracing::info!(product = %self.name, times, "increasing quantity");
        for _ in 0..times {
            self.page.click(INCREASE_QUANTITY_BUTTON).await?;
        }
        Ok(())
    }

    /// Add to cart and wait for the confirmation naming the product
    pub async fn add_to_cart(&self) -> HarnessResult<()> {
        self.page.click(ADD_TO_CART_BUTTON).await?;
        let added = SelectorSignal::new(self.page, CART_NOTIFICATION)
            .with_text(format!("Success: You have added {}", self.name));
        let error = SelectorSignal::new(self.page, ERROR_BANNER);
        self.race.run(&added, &error).await?;
        tracing::info!(product = %self.name, "added to cart");
        Ok(())
    }
}

/// Page object for the shopping cart
#[derive(Debug)]
pub struct CartPage<'a> {
    page: &'a dyn Page,
    base_url: String,
    race: OutcomeRace,
}

impl<'a> CartPage<'a> {
    /// Cart of the storefront at `base_url`
    #[must_use]
    pub fn new(page: &'a dyn Page, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            race: OutcomeRace::new(),
        }
    }

    /// Absolute URL of the cart
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}/{CART_ROUTE}", self.base_url.trim_end_matches('/'))
    }

    /// Navigate to the cart
    pub async fn open(&self) -> HarnessResult<()> {
        self.page.goto(&self.url()).await
    }

    /// Read the line for `product`
    pub async fn line(&self, product: &str) -> HarnessResult<CartLine> {
        let value = self
            .page
            .call_function(CART_LINE_SCRIPT, &serde_json::Value::from(product))
            .await?;
        if value.is_null() {
            return Err(HarnessError::assertion(format!("'{product}' is not in the cart")));
        }
        let raw: RawCartLine = serde_json::from_value(value)?;
        let quantity = raw.quantity.trim().parse().map_err(|_| {
            HarnessError::assertion(format!("quantity '{}' of {product} is not a number", raw.quantity))
        })?;
        Ok(CartLine {
            product: product.to_string(),
            unit_price: Money::parse(&raw.unit)?,
            quantity,
            total: Money::parse(&raw.total)?,
        })
    }

    /// Remove the line and wait until the cart reports it is empty
    pub async fn remove_and_confirm_empty(&self) -> HarnessResult<()> {
        tracing::info!("cleaning up cart");
        self.page.click(REMOVE_BUTTON).await?;
        let empty = SelectorSignal::new(self.page, CART_CONTENT).with_text(EMPTY_CART_TEXT);
        let error = SelectorSignal::new(self.page, ERROR_BANNER);
        self.race.run(&empty, &error).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::{BrowserKind, ContextOptions, Engine, LaunchOptions};
    use crate::mock::MockEngine;
    use std::time::Duration;

    async fn page_on(engine: &MockEngine) -> Box<dyn Page> {
        engine
            .launch(BrowserKind::Chromium, LaunchOptions::new(true))
            .await
            .unwrap()
            .new_context(ContextOptions::default())
            .await
            .unwrap()
            .new_page()
            .await
            .unwrap()
    }

    fn line(unit: u64, quantity: u32, total: u64) -> CartLine {
        CartLine {
            product: "MacBook Pro".into(),
            unit_price: Money::from_cents(unit),
            quantity,
            total: Money::from_cents(total),
        }
    }

    mod money_tests {
        use super::*;

        #[test]
        fn test_parse_display_formats() {
            assert_eq!(Money::parse("$2,000.00").unwrap().cents(), 200_000);
            assert_eq!(Money::parse(" 122.5 ").unwrap().cents(), 12_250);
            assert_eq!(Money::parse("$98").unwrap().cents(), 9_800);
            assert_eq!(Money::parse(".99").unwrap().cents(), 99);
        }

        #[test]
        fn test_parse_rejects_non_prices() {
            for text in ["", "free", "1.2.3", "$1.999"] {
                assert!(Money::parse(text).is_err(), "{text}");
            }
        }

        #[test]
        fn test_display() {
            assert_eq!(Money::from_cents(1_000_005).to_string(), "10000.05");
            assert_eq!(Money::from_cents(7).to_string(), "0.07");
        }

        #[test]
        fn test_times_overflow() {
            assert_eq!(Money::from_cents(250).times(4), Some(Money::from_cents(1_000)));
            assert_eq!(Money::from_cents(u64::MAX).times(2), None);
        }
    }

    mod verify_tests {
        use super::*;

        #[test]
        fn test_matching_total() {
            line(200_000, 5, 1_000_000).verify().unwrap();
        }

        #[test]
        fn test_mismatch_is_distinct_error() {
            let err = line(200_000, 5, 900_000).verify().unwrap_err();
            assert!(matches!(
                err,
                HarnessError::PriceMismatch { ref product, expected, actual }
                    if product == "MacBook Pro"
                        && expected == Money::from_cents(1_000_000)
                        && actual == Money::from_cents(900_000)
            ));
            assert_eq!(
                err.to_string(),
                "Price calculation failed for MacBook Pro! Expected: 10000.00 Actual: 9000.00"
            );
            assert!(!err.is_suite_fatal());
        }
    }

    mod page_tests {
        use super::*;

        #[tokio::test]
        async fn test_read_cart_line() {
            let engine = MockEngine::new().with_function_result(
                "cartLine",
                serde_json::json!({"unit": "$2,000.00", "quantity": "5", "total": "$10,000.00"}),
            );
            let page = page_on(&engine).await;
            let cart = CartPage::new(page.as_ref(), "https://shop.example/");

            let line = cart.line("MacBook Pro").await.unwrap();
            assert_eq!(line.unit_price, Money::from_cents(200_000));
            assert_eq!(line.quantity, 5);
            assert_eq!(line.total, Money::from_cents(1_000_000));
            assert_eq!(engine.evaluations()[0].argument, serde_json::json!("MacBook Pro"));
        }

        #[tokio::test]
        async fn test_missing_line() {
            let engine = MockEngine::new();
            let page = page_on(&engine).await;
            let err = CartPage::new(page.as_ref(), "https://shop.example")
                .line("MacBook Pro")
                .await
                .unwrap_err();
            assert!(err.to_string().contains("'MacBook Pro' is not in the cart"));
        }

        #[tokio::test]
        async fn test_bad_quantity() {
            let engine = MockEngine::new().with_function_result(
                "cartLine",
                serde_json::json!({"unit": "$1.00", "quantity": "five", "total": "$5.00"}),
            );
            let page = page_on(&engine).await;
            let err = CartPage::new(page.as_ref(), "https://shop.example")
                .line("MacBook Pro")
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::AssertionFailed { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_product_flow() {
            let engine = MockEngine::new().with_signal(
                CART_NOTIFICATION,
                "Success: You have added MacBook Pro to your shopping cart!",
                Duration::from_millis(200),
            );
            let page = page_on(&engine).await;
            let product = ProductPage::new(page.as_ref(), "https://shop.example/", 45, "MacBook Pro");

            product.open().await.unwrap();
            product.increase_quantity(4).await.unwrap();
            product.add_to_cart().await.unwrap();

            assert!(engine.was_called("goto:https://shop.example/index.php?route=product/product&product_id=45"));
            assert_eq!(engine.call_count(&format!("click:{INCREASE_QUANTITY_BUTTON}")), 4);
            assert!(engine.was_called(&format!("click:{ADD_TO_CART_BUTTON}")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_remove_waits_for_empty_cart() {
            let engine = MockEngine::new().with_signal(CART_CONTENT, EMPTY_CART_TEXT, Duration::from_millis(300));
            let page = page_on(&engine).await;
            let cart = CartPage::new(page.as_ref(), "https://shop.example");
            cart.remove_and_confirm_empty().await.unwrap();
            assert!(engine.was_called(&format!("click:{REMOVE_BUTTON}")));
        }
    }
}
