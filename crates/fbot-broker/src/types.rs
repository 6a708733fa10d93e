use fbot_schemas::{Bar, BrokerOrderSnapshot, Side};

/// Events a broker adapter produces between bar cycles. The runner drains
/// these at a single well-defined point per bar rather than reacting to them
/// as they arrive, keeping the per-bar loop single-threaded and ordered.
#[derive(Clone, Debug, PartialEq)]
pub enum BrokerEvent {
    Ack { broker_order_id: String, client_order_id: String },
    Fill { broker_order_id: String, client_order_id: String, fill_qty: i64, fill_price: fbot_schemas::Micros, fill_seq: u64 },
    Reject { client_order_id: String, reason: String },
    Disconnected,
    Reconnected,
    Bar(Bar),
}

/// Required capability set for anything that can route orders: connect,
/// read account/position/order state, submit the three order kinds entries
/// and exits are allowed to use, and cancel. No market orders for entries;
/// flattening uses `BrokerOrderKind::MarketEquivalentFlatten` instead.
pub trait BrokerAdapter {
    fn connect(&mut self) -> anyhow::Result<()>;
    fn disconnect(&mut self) -> anyhow::Result<()>;
    fn is_connected(&self) -> bool;

    fn get_account_snapshot(&self) -> anyhow::Result<fbot_schemas::BrokerAccountSnapshot>;
    fn get_position_snapshot(&self, symbol: &str) -> anyhow::Result<Option<fbot_schemas::BrokerPositionSnapshot>>;
    fn get_open_orders_snapshot(&self) -> anyhow::Result<Vec<BrokerOrderSnapshot>>;

    fn submit_limit_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        limit_price: fbot_schemas::Micros,
    ) -> anyhow::Result<BrokerOrderSnapshot>;

    fn submit_stop_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        stop_price: fbot_schemas::Micros,
    ) -> anyhow::Result<BrokerOrderSnapshot>;

    fn submit_target_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        target_price: fbot_schemas::Micros,
    ) -> anyhow::Result<BrokerOrderSnapshot>;

    /// The only route by which a position is ever closed at other than its
    /// resting stop/target price: a reconciliation-driven flatten. Never
    /// used for entries.
    fn submit_flatten_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
    ) -> anyhow::Result<BrokerOrderSnapshot>;

    fn cancel_order(&mut self, broker_order_id: &str) -> anyhow::Result<()>;

    /// Drain events accumulated since the last call. Called once per bar
    /// cycle at the loop's event-drain step.
    fn drain_events(&mut self) -> Vec<BrokerEvent>;
}
