//! Declared order schema
//!
//! Every column the pipeline knows about is a [`Field`]. The [`Schema`] built
//! at ingestion records which of them are present, so later stages ask the
//! schema instead of probing column names.

use crate::errors::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Known order columns, input and derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "Order_ID")]
    OrderId,
    #[serde(rename = "Product_ID")]
    ProductId,
    #[serde(rename = "Price")]
    Price,
    #[serde(rename = "Return_Flag")]
    ReturnFlag,
    #[serde(rename = "Order_Date")]
    OrderDate,
    #[serde(rename = "Delivery_Issue")]
    DeliveryIssue,
    #[serde(rename = "Product_Category")]
    ProductCategory,
    #[serde(rename = "Vendor")]
    Vendor,
    #[serde(rename = "Region")]
    Region,
    #[serde(rename = "Customer_Segment")]
    CustomerSegment,
    #[serde(rename = "Payment_Method")]
    PaymentMethod,
    #[serde(rename = "Quantity")]
    Quantity,
    #[serde(rename = "Order_Month")]
    OrderMonth,
    #[serde(rename = "Order_DayOfWeek")]
    OrderDayOfWeek,
    #[serde(rename = "High_Price_Flag")]
    HighPriceFlag,
    #[serde(rename = "Delivery_Issue_Flag")]
    DeliveryIssueFlag,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::OrderId,
        Field::ProductId,
        Field::Price,
        Field::ReturnFlag,
        Field::OrderDate,
        Field::DeliveryIssue,
        Field::ProductCategory,
        Field::Vendor,
        Field::Region,
        Field::CustomerSegment,
        Field::PaymentMethod,
        Field::Quantity,
        Field::OrderMonth,
        Field::OrderDayOfWeek,
        Field::HighPriceFlag,
        Field::DeliveryIssueFlag,
    ];

    /// Column header used in CSV input and output
    pub const fn column(self) -> &'static str {
        match self {
            Field::OrderId => "Order_ID",
            Field::ProductId => "Product_ID",
            Field::Price => "Price",
            Field::ReturnFlag => "Return_Flag",
            Field::OrderDate => "Order_Date",
            Field::DeliveryIssue => "Delivery_Issue",
            Field::ProductCategory => "Product_Category",
            Field::Vendor => "Vendor",
            Field::Region => "Region",
            Field::CustomerSegment => "Customer_Segment",
            Field::PaymentMethod => "Payment_Method",
            Field::Quantity => "Quantity",
            Field::OrderMonth => "Order_Month",
            Field::OrderDayOfWeek => "Order_DayOfWeek",
            Field::HighPriceFlag => "High_Price_Flag",
            Field::DeliveryIssueFlag => "Delivery_Issue_Flag",
        }
    }

    pub fn from_column(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.column() == name)
    }

    /// Computed by the cleaner rather than read from input
    pub const fn is_derived(self) -> bool {
        matches!(
            self,
            Field::OrderMonth | Field::OrderDayOfWeek | Field::HighPriceFlag | Field::DeliveryIssueFlag
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Whether `Return_Flag` must be present and filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPolicy {
    /// Training data: the column is required and rows without a label are incomplete
    #[default]
    Required,
    /// New orders to score: the label may be absent or blank
    Optional,
}

/// Fields whose absence aborts ingestion of labeled data
pub const REQUIRED_FIELDS: [Field; 1] = [Field::ReturnFlag];

/// Rows missing any of these (when the column exists) are dropped
pub const CRITICAL_FIELDS: [Field; 4] = [Field::OrderId, Field::ProductId, Field::Price, Field::ReturnFlag];

/// Numerical feature candidates, in priority order
pub const NUMERICAL_CANDIDATES: [Field; 6] = [
    Field::Price,
    Field::Quantity,
    Field::OrderMonth,
    Field::OrderDayOfWeek,
    Field::HighPriceFlag,
    Field::DeliveryIssueFlag,
];

/// Categorical feature candidates, in priority order
pub const CATEGORICAL_CANDIDATES: [Field; 6] = [
    Field::ProductCategory,
    Field::Vendor,
    Field::Region,
    Field::CustomerSegment,
    Field::PaymentMethod,
    Field::ProductId,
];

/// Cell contents treated as missing on ingestion
pub const MISSING_MARKERS: [&str; 19] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA", "#N/A N/A", "-1.#IND", "-1.#QNAN", "1.#IND", "1.#QNAN",
];

/// Typed record of which known fields a table carries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    present: BTreeSet<Field>,
    labels: LabelPolicy,
}

impl Schema {
    /// Validate a labeled header row and record the known fields it contains
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        Self::from_headers_with(headers, LabelPolicy::Required)
    }

    pub fn from_headers_with<S: AsRef<str>>(headers: &[S], labels: LabelPolicy) -> Result<Self> {
        let mut seen = HashSet::with_capacity(headers.len());
        for header in headers {
            if !seen.insert(header.as_ref()) {
                return Err(RiskError::Schema(format!(
                    "duplicate column '{}'",
                    header.as_ref()
                )));
            }
        }

        let present: BTreeSet<Field> = headers
            .iter()
            .filter_map(|h| Field::from_column(h.as_ref()))
            .collect();

        for field in REQUIRED_FIELDS {
            if labels == LabelPolicy::Required && !present.contains(&field) {
                return Err(RiskError::Schema(format!(
                    "dataset must contain a '{}' column (0 = not returned, 1 = returned)",
                    field
                )));
            }
        }

        Ok(Self { present, labels })
    }

    pub fn has(&self, field: Field) -> bool {
        self.present.contains(&field)
    }

    /// Schema after a derived column has been added
    pub fn with(&self, field: Field) -> Self {
        let mut present = self.present.clone();
        present.insert(field);
        Self {
            present,
            labels: self.labels,
        }
    }

    pub fn label_policy(&self) -> LabelPolicy {
        self.labels
    }

    /// Critical fields this table actually carries
    ///
    /// An optional label is never critical.
    pub fn critical_present(&self) -> Vec<Field> {
        CRITICAL_FIELDS
            .into_iter()
            .filter(|f| self.has(*f))
            .filter(|f| !(*f == Field::ReturnFlag && self.labels == LabelPolicy::Optional))
            .collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.present.iter().copied()
    }
}

pub fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_column(field.column()), Some(field));
        }
        assert_eq!(Field::from_column("Unknown"), None);
    }

    #[test]
    fn test_missing_return_flag_is_schema_error() {
        let err = Schema::from_headers(&["Order_ID", "Price"]).unwrap_err();
        assert!(matches!(err, RiskError::Schema(_)));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = Schema::from_headers(&["Return_Flag", "Price", "Price"]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_critical_present_skips_absent_columns() {
        let schema = Schema::from_headers(&["Return_Flag", "Price", "Region"]).unwrap();
        assert_eq!(schema.critical_present(), vec![Field::Price, Field::ReturnFlag]);
        assert!(schema.has(Field::Region));
        assert!(!schema.has(Field::OrderId));
    }

    #[test]
    fn test_optional_label_schema() {
        let schema = Schema::from_headers_with(&["Order_ID", "Price"], LabelPolicy::Optional).unwrap();
        assert_eq!(schema.critical_present(), vec![Field::OrderId, Field::Price]);

        let labeled =
            Schema::from_headers_with(&["Order_ID", "Return_Flag"], LabelPolicy::Optional).unwrap();
        assert_eq!(labeled.critical_present(), vec![Field::OrderId]);
        assert_eq!(labeled.with(Field::HighPriceFlag).label_policy(), LabelPolicy::Optional);
    }

    #[test]
    fn test_with_adds_derived_field() {
        let schema = Schema::from_headers(&["Return_Flag"]).unwrap();
        let derived = schema.with(Field::HighPriceFlag);
        assert!(derived.has(Field::HighPriceFlag));
        assert!(!schema.has(Field::HighPriceFlag));
        assert!(Field::HighPriceFlag.is_derived());
    }

    #[test]
    fn test_field_serializes_as_column_name() {
        let json = serde_json::to_string(&Field::OrderDayOfWeek).unwrap();
        assert_eq!(json, "\"Order_DayOfWeek\"");
    }
}
