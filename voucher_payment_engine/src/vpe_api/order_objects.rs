use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderReference, OrderStatusType, VoucherStatus, VoucherType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub reference: Option<OrderReference>,
    pub phone: Option<String>,
    pub voucher_type: Option<VoucherType>,
    pub status: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_reference(mut self, reference: OrderReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_phone(mut self, phone: String) -> Self {
        self.phone = Some(phone);
        self
    }

    pub fn with_voucher_type(mut self, voucher_type: VoucherType) -> Self {
        self.voucher_type = Some(voucher_type);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// True when no WHERE clause would be generated. `limit`/`offset` only shape the result set, so they are not
    /// counted here.
    pub fn is_empty(&self) -> bool {
        self.reference.is_none() &&
            self.phone.is_none() &&
            self.voucher_type.is_none() &&
            self.status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

/// Filter for the admin voucher listing. `search` matches serial, PIN or buyer phone as a substring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoucherQueryFilter {
    pub voucher_type: Option<VoucherType>,
    pub status: Option<VoucherStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl VoucherQueryFilter {
    pub fn with_voucher_type(mut self, voucher_type: VoucherType) -> Self {
        self.voucher_type = Some(voucher_type);
        self
    }

    pub fn with_status(mut self, status: VoucherStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.voucher_type.is_none() && self.status.is_none() && self.search.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(reference) = &self.reference {
            write!(f, "reference: {reference}. ")?;
        }
        if let Some(phone) = &self.phone {
            write!(f, "phone: {phone}. ")?;
        }
        if let Some(voucher_type) = &self.voucher_type {
            write!(f, "type: {voucher_type}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}
