use crate::domain::coupon::{Coupon, CouponCode, CouponRejection, Reservation};
use crate::domain::order::{Order, OrderId, OrderItem, Resolution, UserId};
use crate::domain::payment_code::PaymentCode;
use crate::domain::ports::{CouponStore, InsertOutcome, OrderStore};
use crate::error::{Result, StorefrontError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for order rows, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for the line items of each order, keyed by order id.
pub const CF_ORDER_ITEMS: &str = "order_items";
/// Column Family enforcing payment-code uniqueness: code digits -> order id.
pub const CF_PAYMENT_CODES: &str = "payment_codes";
/// Column Family for coupons, keyed by normalized code.
pub const CF_COUPONS: &str = "coupons";

/// How long a transaction waits for a contended row lock, in milliseconds.
const ROW_LOCK_TIMEOUT_MS: i64 = 5_000;

/// A persistent store implementation using a RocksDB `TransactionDB`.
///
/// Every guarded write (status transition, coupon increment, order insert
/// with its uniqueness check) runs in a pessimistic transaction that locks
/// the row with `get_for_update` before writing, so concurrent writers to the
/// same key serialize in the storage engine rather than in application code.
///
/// Transactions never span an `.await`; each trait method delegates to a
/// synchronous helper.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the column families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ORDERS, CF_ORDER_ITEMS, CF_PAYMENT_CODES, CF_COUPONS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(ROW_LOCK_TIMEOUT_MS);

        let db = TransactionDB::open_cf_descriptors(&opts, &txn_opts, path, cfs)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorefrontError::internal(format!("{name} column family not found")))
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn insert_order(&self, order: Order, items: Vec<OrderItem>) -> Result<InsertOutcome> {
        let codes = self.cf(CF_PAYMENT_CODES)?;
        let orders = self.cf(CF_ORDERS)?;
        let order_items = self.cf(CF_ORDER_ITEMS)?;
        let code_key = order.payment_code.digits().as_bytes().to_vec();

        let txn = self.db.transaction();
        if txn.get_for_update_cf(codes, &code_key, true)?.is_some() {
            return Ok(InsertOutcome::DuplicatePaymentCode);
        }
        txn.put_cf(codes, &code_key, order.id.as_bytes())?;
        txn.put_cf(orders, order.id.as_bytes(), encode(&order)?)?;
        txn.put_cf(order_items, order.id.as_bytes(), encode(&items)?)?;
        txn.commit()?;
        Ok(InsertOutcome::Inserted)
    }

    fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn order_id_for_code(&self, code: &PaymentCode) -> Result<Option<OrderId>> {
        let cf = self.cf(CF_PAYMENT_CODES)?;
        match self.db.get_cf(cf, code.digits().as_bytes())? {
            Some(bytes) => OrderId::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorefrontError::internal(format!("Corrupt payment code index: {e}"))),
            None => Ok(None),
        }
    }

    fn resolve_order(&self, id: OrderId, resolution: Resolution, at: DateTime<Utc>) -> Result<bool> {
        let cf = self.cf(CF_ORDERS)?;
        let txn = self.db.transaction();
        let Some(bytes) = txn.get_for_update_cf(cf, id.as_bytes(), true)? else {
            return Ok(false);
        };
        let mut order: Order = decode(&bytes)?;
        if !order.resolve(resolution, at) {
            // Dropping the transaction rolls it back and frees the row lock.
            return Ok(false);
        }
        txn.put_cf(cf, id.as_bytes(), encode(&order)?)?;
        txn.commit()?;
        Ok(true)
    }

    fn insert_coupon(&self, coupon: Coupon) -> Result<bool> {
        let cf = self.cf(CF_COUPONS)?;
        let key = coupon.code.as_str().as_bytes().to_vec();
        let txn = self.db.transaction();
        if txn.get_for_update_cf(cf, &key, true)?.is_some() {
            return Ok(false);
        }
        txn.put_cf(cf, &key, encode(&coupon)?)?;
        txn.commit()?;
        Ok(true)
    }

    fn get_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        let cf = self.cf(CF_COUPONS)?;
        match self.db.get_cf(cf, code.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn reserve_coupon(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Reservation> {
        let cf = self.cf(CF_COUPONS)?;
        let key = code.as_str().as_bytes();
        let txn = self.db.transaction();
        let Some(bytes) = txn.get_for_update_cf(cf, key, true)? else {
            return Ok(Reservation::Rejected(CouponRejection::Invalid));
        };
        let mut coupon: Coupon = decode(&bytes)?;
        if let Err(rejection) = coupon.try_take_slot(now) {
            return Ok(Reservation::Rejected(rejection));
        }
        txn.put_cf(cf, key, encode(&coupon)?)?;
        txn.commit()?;
        Ok(Reservation::Reserved {
            discount_percent: coupon.discount_percent,
        })
    }

    fn release_coupon(&self, code: &CouponCode) -> Result<bool> {
        let cf = self.cf(CF_COUPONS)?;
        let key = code.as_str().as_bytes();
        let txn = self.db.transaction();
        let Some(bytes) = txn.get_for_update_cf(cf, key, true)? else {
            return Ok(false);
        };
        let mut coupon: Coupon = decode(&bytes)?;
        if !coupon.return_slot() {
            return Ok(false);
        }
        txn.put_cf(cf, key, encode(&coupon)?)?;
        txn.commit()?;
        Ok(true)
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert(&self, order: Order, items: Vec<OrderItem>) -> Result<InsertOutcome> {
        self.insert_order(order, items)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_order(id)
    }

    async fn find_by_payment_code(&self, code: &PaymentCode) -> Result<Option<Order>> {
        match self.order_id_for_code(code)? {
            Some(id) => self.get_order(id),
            None => Ok(None),
        }
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let cf = self.cf(CF_ORDER_ITEMS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>> {
        let orders: Vec<Order> = self.scan(CF_ORDERS)?;
        Ok(orders.into_iter().filter(|o| o.owner_id == owner).collect())
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS)
    }

    async fn resolve(&self, id: OrderId, resolution: Resolution, at: DateTime<Utc>) -> Result<bool> {
        self.resolve_order(id, resolution, at)
    }
}

#[async_trait]
impl CouponStore for RocksDBStore {
    async fn insert(&self, coupon: Coupon) -> Result<bool> {
        self.insert_coupon(coupon)
    }

    async fn get(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        self.get_coupon(code)
    }

    async fn reserve(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Reservation> {
        self.reserve_coupon(code, now)
    }

    async fn release(&self, code: &CouponCode) -> Result<bool> {
        self.release_coupon(code)
    }
}
