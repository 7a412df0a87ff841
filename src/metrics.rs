use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

pub static PROPOSALS_APPROVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentinel_compliance_approved_total",
        "Total proposals approved by the compliance pipeline"
    )
    .expect("approved counter")
});

pub static PROPOSALS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentinel_compliance_rejected_total",
        "Total proposals rejected by the compliance pipeline"
    )
    .expect("rejected counter")
});

pub static STORE_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentinel_compliance_store_timeouts_total",
        "Ledger store lookups that exceeded the configured timeout"
    )
    .expect("store_timeouts counter")
});

pub static VELOCITY_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentinel_compliance_velocity_rejections_total",
        "Proposals rejected by the velocity check"
    )
    .expect("velocity_rejections counter")
});

pub static AUDIT_ENTRIES_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sentinel_compliance_audit_entries_total",
        "Audit log entries durably written"
    )
    .expect("audit_entries counter")
});

pub fn inc_approved() {
    PROPOSALS_APPROVED.inc();
}

pub fn inc_rejected() {
    PROPOSALS_REJECTED.inc();
}

pub fn inc_store_timeouts() {
    STORE_TIMEOUTS.inc();
}

pub fn inc_velocity_rejections() {
    VELOCITY_REJECTIONS.inc();
}

pub fn inc_audit_entries() {
    AUDIT_ENTRIES_WRITTEN.inc();
}
