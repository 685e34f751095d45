use proptest::prelude::*;
use return_risk_core::cleaning::{clean, drop_duplicates, quantile};
use return_risk_core::features::{FeatureFrame, FeatureSet};
use return_risk_core::preprocessing::Preprocessor;
use return_risk_core::{Field, OrderTable, Value};

// Property-based tests for the cleaning and preprocessing contract

#[derive(Debug, Clone)]
struct RawOrder {
    order_id: Option<u8>,
    product_id: Option<u8>,
    price: Option<String>,
    returned: Option<bool>,
    delivery_issue: &'static str,
}

fn arbitrary_price() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        4 => (1u32..500).prop_map(|p| Some(p.to_string())),
        1 => Just(Some("abc".to_string())),
        1 => Just(None),
    ]
}

fn arbitrary_order() -> impl Strategy<Value = RawOrder> {
    (
        prop::option::weighted(0.9, 0u8..20),
        prop::option::weighted(0.9, 0u8..5),
        arbitrary_price(),
        prop::option::weighted(0.95, any::<bool>()),
        prop::sample::select(vec!["Yes", "no", "YES", ""]),
    )
        .prop_map(|(order_id, product_id, price, returned, delivery_issue)| RawOrder {
            order_id,
            product_id,
            price,
            returned,
            delivery_issue,
        })
}

fn to_csv(orders: &[RawOrder]) -> String {
    let mut csv = String::from("Order_ID,Product_ID,Price,Return_Flag,Delivery_Issue\n");
    for o in orders {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            o.order_id.map(|v| v.to_string()).unwrap_or_default(),
            o.product_id.map(|v| format!("P{}", v)).unwrap_or_default(),
            o.price.clone().unwrap_or_default(),
            o.returned.map(|r| u8::from(r).to_string()).unwrap_or_default(),
            o.delivery_issue,
        ));
    }
    csv
}

fn cleaned(orders: &[RawOrder]) -> OrderTable {
    let table = OrderTable::from_reader(to_csv(orders).as_bytes()).expect("valid csv");
    clean(table).expect("cleaning succeeds").0
}

proptest! {
    #[test]
    fn return_flag_is_binary_after_cleaning(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let table = cleaned(&orders);
        for value in table.field(Field::ReturnFlag).unwrap() {
            prop_assert!(matches!(value, Value::Int(0) | Value::Int(1)));
        }
    }

    #[test]
    fn incomplete_rows_never_survive(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let table = cleaned(&orders);
        for field in [Field::OrderId, Field::ProductId, Field::Price, Field::ReturnFlag] {
            for value in table.field(field).unwrap() {
                prop_assert!(!value.is_missing());
            }
        }
    }

    #[test]
    fn deduplication_is_idempotent(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let table = cleaned(&orders);
        let rows = table.len();
        let (again, removed) = drop_duplicates(table);
        prop_assert_eq!(removed, 0);
        prop_assert_eq!(again.len(), rows);
    }

    #[test]
    fn high_price_flag_matches_threshold(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let table = cleaned(&orders);
        let prices: Vec<f64> = table
            .field(Field::Price)
            .unwrap()
            .iter()
            .map(|v| v.as_f64().expect("price imputed"))
            .collect();
        let mut sorted = prices.clone();
        sorted.sort_by(f64::total_cmp);

        if let Some(threshold) = quantile(&sorted, 0.75) {
            let flags = table.field(Field::HighPriceFlag).unwrap();
            for (price, flag) in prices.iter().zip(flags) {
                let expected = i64::from(*price > threshold);
                prop_assert_eq!(flag, &Value::Int(expected));
            }
        }
    }

    #[test]
    fn unseen_categories_encode_to_zero(
        seen in prop::collection::vec("[a-c]", 1..20),
        unseen in "[x-z]{2}",
    ) {
        let mut csv = String::from("Return_Flag,Region\n");
        for region in &seen {
            csv.push_str(&format!("0,{}\n", region));
        }
        let train = OrderTable::from_reader(csv.as_bytes()).unwrap();
        let set = FeatureSet::select(train.schema());
        let fitted = Preprocessor::fit(&FeatureFrame::extract(&train, &set).unwrap());

        let probe = OrderTable::from_reader(format!("Return_Flag,Region\n0,{}\n", unseen).as_bytes()).unwrap();
        let x = fitted.apply(&FeatureFrame::extract(&probe, &set).unwrap()).unwrap();
        prop_assert!(x[0].iter().all(|v| *v == 0.0));
    }
}

#[test]
fn unparseable_price_is_imputed_not_dropped() {
    let csv = "Order_ID,Product_ID,Price,Return_Flag\n1,A,10,0\n2,B,abc,1\n3,C,30,0\n";
    let table = cleaned_from(csv);
    assert_eq!(table.len(), 3);
    assert_eq!(table.field(Field::Price).unwrap()[1], Value::Float(20.0));
}

#[test]
fn price_at_threshold_is_not_flagged() {
    // q75 of [10, 20, 30, 30, 40] is exactly 30
    let csv = "Price,Return_Flag\n10,0\n20,0\n30,1\n30,0\n40,1\n";
    let table = cleaned_from(csv);
    let flags: Vec<&Value> = table.field(Field::HighPriceFlag).unwrap().iter().collect();
    assert_eq!(
        flags,
        vec![&Value::Int(0), &Value::Int(0), &Value::Int(0), &Value::Int(0), &Value::Int(1)]
    );
}

fn cleaned_from(csv: &str) -> OrderTable {
    clean(OrderTable::from_reader(csv.as_bytes()).unwrap()).unwrap().0
}
