use serde::{Deserialize, Serialize};

// A scraped product deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub title: String,
    pub summary: String, // 3-4 sentence summary of the product
    pub price: f64,      // Advertised deal price
    pub url: String,
}

impl Deal {
    /// Description handed to the estimators. The deal price is left out so it
    /// cannot leak into the estimate.
    pub fn product_description(&self) -> String {
        format!("Title: {}\nSummary: {}", self.title, self.summary)
    }
}

// A deal together with what we think it is actually worth
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub deal: Deal,
    pub estimate: f64,
    pub discount: f64, // estimate - deal price
}

impl Opportunity {
    pub fn new(deal: Deal, estimate: f64) -> Self {
        let discount = estimate - deal.price;
        Self { deal, estimate, discount }
    }

    pub fn message(&self) -> String {
        format!(
            "{}\nDeal price: ${:.2} | Estimated price: ${:.2} | Save ${:.2}\n{}",
            self.deal.title, self.deal.price, self.estimate, self.discount, self.deal.url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal() -> Deal {
        Deal {
            title: "Logitech MX Master 3S".to_string(),
            summary: "Wireless performance mouse.".to_string(),
            price: 69.99,
            url: "https://example.com/mx".to_string(),
        }
    }

    #[test]
    fn test_product_description_hides_price() {
        let description = deal().product_description();
        assert_eq!(description, "Title: Logitech MX Master 3S\nSummary: Wireless performance mouse.");
        assert!(!description.contains("69.99"));
    }

    #[test]
    fn test_opportunity_discount() {
        let opportunity = Opportunity::new(deal(), 99.99);
        assert!((opportunity.discount - 30.0).abs() < 1e-9);
        assert!(opportunity.message().contains("Save $30.00"));
    }
}
