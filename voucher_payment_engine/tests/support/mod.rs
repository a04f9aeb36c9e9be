use vpg_common::Cedi;
use voucher_payment_engine::{
    db_types::{NewOrder, NewVoucher, OrderReference, VoucherType},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

/// Seeds `count` available vouchers of the given type with predictable serials.
pub async fn seed_vouchers(db: &SqliteDatabase, voucher_type: VoucherType, count: usize) {
    use voucher_payment_engine::traits::AllocationDatabase;
    let batch = (0..count)
        .map(|i| NewVoucher::new(voucher_type, format!("{voucher_type}-{i:04}"), format!("PIN{i:06}")))
        .collect::<Vec<_>>();
    let summary = db.upload_vouchers(&batch).await.expect("Error uploading vouchers");
    assert_eq!(summary.inserted, count);
}

pub fn wassce_order(reference: &str, quantity: i64) -> NewOrder {
    let amount = Cedi::from_cedis(25) * quantity;
    NewOrder::new(OrderReference::from(reference.to_string()), "233241234567", VoucherType::Wassce, quantity, amount)
}
