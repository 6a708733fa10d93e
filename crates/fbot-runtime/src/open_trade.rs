use fbot_execution::ExecutionSupervisor;
use fbot_schemas::{Micros, Side};
use fbot_trademgr::{ExitReason, TradePosition};

/// Everything the runner tracks for the single trade it may have open at
/// once. `stop_ticks`/`target_ticks` are carried here rather than on
/// `TradePosition` since only the runner needs them, to derive bracket
/// prices when (re)arming the children.
pub struct OpenTrade {
    pub supervisor: ExecutionSupervisor,
    pub position: TradePosition,
    pub stop_client_order_id: String,
    pub target_client_order_id: String,
    pub flatten_client_order_id: Option<String>,
    pub pending_exit_reason: Option<ExitReason>,
    stop_ticks: u32,
    target_ticks: u32,
}

impl OpenTrade {
    pub fn new(
        supervisor: ExecutionSupervisor,
        position: TradePosition,
        stop_client_order_id: String,
        target_client_order_id: String,
        stop_ticks: u32,
        target_ticks: u32,
    ) -> Self {
        Self {
            supervisor,
            position,
            stop_client_order_id,
            target_client_order_id,
            flatten_client_order_id: None,
            pending_exit_reason: None,
            stop_ticks,
            target_ticks,
        }
    }

    pub fn stop_price(&self, tick_size: f64) -> Micros {
        let offset = self.stop_ticks as f64 * tick_size;
        let entry = self.position.entry_price.to_dollars();
        Micros::from_dollars(match self.position.side {
            Side::Buy => entry - offset,
            Side::Sell => entry + offset,
        })
    }

    pub fn target_price(&self, tick_size: f64) -> Micros {
        let offset = self.target_ticks as f64 * tick_size;
        let entry = self.position.entry_price.to_dollars();
        Micros::from_dollars(match self.position.side {
            Side::Buy => entry + offset,
            Side::Sell => entry - offset,
        })
    }
}
