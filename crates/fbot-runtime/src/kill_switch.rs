//! Kill-switch policy: the last line of defense, checked once per bar after
//! everything else has run. Any hit is sticky for the life of the run.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillSwitchCause {
    DataQualityCollapse,
    NegativeBuyingPower,
    ReconciliationDivergence,
    DailyLossCapBreached,
}

/// `reconcile_mismatch_streak >= 2` means one corrective reconcile attempt
/// already happened and the position still diverges from broker truth.
pub fn evaluate(
    dvs: f64,
    dvs_kill: f64,
    buying_power_usd: f64,
    reconcile_mismatch_streak: u32,
    daily_loss_halted: bool,
) -> Option<KillSwitchCause> {
    if dvs < dvs_kill {
        return Some(KillSwitchCause::DataQualityCollapse);
    }
    if buying_power_usd < 0.0 {
        return Some(KillSwitchCause::NegativeBuyingPower);
    }
    if reconcile_mismatch_streak >= 2 {
        return Some(KillSwitchCause::ReconciliationDivergence);
    }
    if daily_loss_halted {
        return Some(KillSwitchCause::DailyLossCapBreached);
    }
    None
}
