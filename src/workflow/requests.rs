use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::price_change::{
    AdjustmentType, CreatePriceChange, OrderNo, PriceChangeOrder, PricingPolicy, StoreId,
};

use super::errors::WorkflowError;

// ============================================================================
// Workflow Requests
// ============================================================================

/// One price change for one product in one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeRequest {
    pub product_code: String,
    pub product_name: String,
    pub specification: Option<String>,
    pub target_region: String,
    pub adjustment_type: AdjustmentType,
    pub adjustment_amount: Decimal,
    pub change_reason: String,
    pub effective_date: DateTime<Utc>,
    pub affected_store_ids: Vec<StoreId>,
    pub created_by: String,
}

impl PriceChangeRequest {
    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        require("product_code", &self.product_code)?;
        require("product_name", &self.product_name)?;
        require("target_region", &self.target_region)?;
        require("change_reason", &self.change_reason)?;
        require("created_by", &self.created_by)?;
        Ok(())
    }

    pub(crate) fn into_command(self, order_no: OrderNo, original_price: Decimal, policy: PricingPolicy) -> CreatePriceChange {
        CreatePriceChange {
            order_no,
            product_code: self.product_code,
            product_name: self.product_name,
            specification: self.specification,
            target_region: self.target_region,
            original_price,
            adjustment_type: self.adjustment_type,
            adjustment_amount: self.adjustment_amount,
            change_reason: self.change_reason,
            effective_date: self.effective_date,
            affected_store_ids: self.affected_store_ids,
            created_by: self.created_by,
            policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_code: String,
    pub product_name: String,
    pub specification: Option<String>,
}

/// Target price for one region and the outlets that receive it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalPrice {
    pub region: String,
    pub price: Decimal,
    pub store_ids: Vec<StoreId>,
}

/// Sets every listed product to the regional target price, one order per
/// (product, region) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPriceChangeRequest {
    pub products: Vec<ProductInfo>,
    pub regional_prices: Vec<RegionalPrice>,
    pub effective_date: DateTime<Utc>,
    pub change_reason: String,
    pub created_by: String,
}

impl BatchPriceChangeRequest {
    /// Adjustment request moving `product` in `regional` from `current_price`
    /// to the target price
    pub(crate) fn member(
        &self,
        product: &ProductInfo,
        regional: &RegionalPrice,
        current_price: Decimal,
    ) -> PriceChangeRequest {
        let delta = regional.price - current_price;
        let adjustment_type = if delta < Decimal::ZERO {
            AdjustmentType::Decrease
        } else {
            AdjustmentType::Increase
        };

        PriceChangeRequest {
            product_code: product.product_code.clone(),
            product_name: product.product_name.clone(),
            specification: product.specification.clone(),
            target_region: regional.region.clone(),
            adjustment_type,
            adjustment_amount: delta.abs(),
            change_reason: self.change_reason.clone(),
            effective_date: self.effective_date,
            affected_store_ids: regional.store_ids.clone(),
            created_by: self.created_by.clone(),
        }
    }
}

/// A batch member that could not be created
#[derive(Debug)]
pub struct BatchRejection {
    pub product_code: String,
    pub region: String,
    pub error: WorkflowError,
}

/// Result of `create_batch`; members are independent of each other
#[derive(Debug, Default)]
pub struct BatchCreation {
    pub orders: Vec<PriceChangeOrder>,
    pub rejections: Vec<BatchRejection>,
}

impl BatchCreation {
    pub fn is_complete(&self) -> bool {
        self.rejections.is_empty()
    }
}

fn require(field: &str, value: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::InvalidRequest(format!("{} must not be blank", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn batch() -> BatchPriceChangeRequest {
        BatchPriceChangeRequest {
            products: vec![ProductInfo {
                product_code: "LATTE".into(),
                product_name: "Latte".into(),
                specification: Some("Tall".into()),
            }],
            regional_prices: vec![RegionalPrice {
                region: "EAST".into(),
                price: dec!(33.00),
                store_ids: vec![StoreId(7)],
            }],
            effective_date: Utc::now(),
            change_reason: "Promotion".into(),
            created_by: "wang.wu".into(),
        }
    }

    #[test]
    fn test_target_price_becomes_signed_delta() {
        let batch = batch();
        let lower = batch.member(&batch.products[0], &batch.regional_prices[0], dec!(36.00));
        assert_eq!(lower.adjustment_type, AdjustmentType::Decrease);
        assert_eq!(lower.adjustment_amount, dec!(3.00));
        assert_eq!(lower.affected_store_ids, vec![StoreId(7)]);

        let higher = batch.member(&batch.products[0], &batch.regional_prices[0], dec!(30.00));
        assert_eq!(higher.adjustment_type, AdjustmentType::Increase);
        assert_eq!(higher.adjustment_amount, dec!(3.00));
    }

    #[test]
    fn test_blank_fields_rejected() {
        let batch = batch();
        let mut request = batch.member(&batch.products[0], &batch.regional_prices[0], dec!(36.00));
        assert!(request.validate().is_ok());

        request.change_reason = "   ".into();
        let err = request.validate().unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidRequest(ref m) if m.contains("change_reason")));
    }
}
