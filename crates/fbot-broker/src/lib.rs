//! fbot-broker — deterministic in-memory broker adapter.
//!
//! Orders are keyed by `client_order_id` (the broker never assigns an
//! independent id), state transitions are idempotent on resubmission, and
//! iteration order is
//! deterministic via `BTreeMap`. Unlike a real adapter, fills are never
//! generated implicitly; callers (scenario tests, a simulator) drive them
//! explicitly through `apply_fill`.

mod types;

pub use types::{BrokerAdapter, BrokerEvent};

use std::collections::{BTreeMap, VecDeque};

use anyhow::{bail, Context};
use fbot_schemas::{
    BrokerAccountSnapshot, BrokerOrderKind, BrokerOrderSnapshot, BrokerOrderState,
    BrokerPositionSnapshot, Micros, Side,
};

#[derive(Clone, Debug)]
pub struct InMemoryBroker {
    connected: bool,
    account: BrokerAccountSnapshot,
    orders: BTreeMap<String, BrokerOrderSnapshot>,
    positions: BTreeMap<String, i64>,
    events: VecDeque<BrokerEvent>,
    next_fill_seq: u64,
}

impl InMemoryBroker {
    pub fn new(account: BrokerAccountSnapshot) -> Self {
        Self {
            connected: false,
            account,
            orders: BTreeMap::new(),
            positions: BTreeMap::new(),
            events: VecDeque::new(),
            next_fill_seq: 0,
        }
    }

    fn submit(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        kind: BrokerOrderKind,
    ) -> anyhow::Result<BrokerOrderSnapshot> {
        if !self.connected {
            bail!("cannot submit order while disconnected");
        }
        if let Some(existing) = self.orders.get(client_order_id) {
            // Idempotent resubmission: return what is already on file, no
            // new event, no state change.
            return Ok(existing.clone());
        }
        let snapshot = BrokerOrderSnapshot {
            broker_order_id: client_order_id.to_string(),
            client_order_id: client_order_id.to_string(),
            symbol: symbol.to_string(),
            side,
            kind,
            state: BrokerOrderState::Accepted,
            qty,
            filled_qty: 0,
        };
        self.orders.insert(client_order_id.to_string(), snapshot.clone());
        self.events.push_back(BrokerEvent::Ack {
            broker_order_id: client_order_id.to_string(),
            client_order_id: client_order_id.to_string(),
        });
        Ok(snapshot)
    }

    /// Apply a deterministic fill to a previously submitted order. `fill_qty`
    /// is the incremental quantity filled, not the cumulative total.
    pub fn apply_fill(&mut self, client_order_id: &str, fill_qty: i64, fill_price: Micros) -> anyhow::Result<()> {
        let order = self
            .orders
            .get_mut(client_order_id)
            .with_context(|| format!("no such order: {client_order_id}"))?;
        if order.state == BrokerOrderState::Canceled || order.state == BrokerOrderState::Rejected {
            bail!("cannot fill a terminal order");
        }
        order.filled_qty += fill_qty;
        order.state = if order.filled_qty >= order.qty {
            BrokerOrderState::Filled
        } else {
            BrokerOrderState::PartiallyFilled
        };

        let signed_delta = fill_qty * order.side.sign();
        *self.positions.entry(order.symbol.clone()).or_insert(0) += signed_delta;

        let broker_order_id = order.broker_order_id.clone();
        let fill_seq = self.next_fill_seq;
        self.next_fill_seq += 1;
        self.events.push_back(BrokerEvent::Fill {
            broker_order_id,
            client_order_id: client_order_id.to_string(),
            fill_qty,
            fill_price,
            fill_seq,
        });
        Ok(())
    }

    pub fn set_account(&mut self, account: BrokerAccountSnapshot) {
        self.account = account;
    }
}

impl BrokerAdapter for InMemoryBroker {
    fn connect(&mut self) -> anyhow::Result<()> {
        let was_connected = self.connected;
        self.connected = true;
        if !was_connected {
            self.events.push_back(BrokerEvent::Reconnected);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        if self.connected {
            self.events.push_back(BrokerEvent::Disconnected);
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn get_account_snapshot(&self) -> anyhow::Result<BrokerAccountSnapshot> {
        Ok(self.account.clone())
    }

    fn get_position_snapshot(&self, symbol: &str) -> anyhow::Result<Option<BrokerPositionSnapshot>> {
        Ok(self.positions.get(symbol).map(|qty| BrokerPositionSnapshot {
            symbol: symbol.to_string(),
            qty_signed: *qty,
            avg_price: Micros::from_dollars(0.0),
        }))
    }

    fn get_open_orders_snapshot(&self) -> anyhow::Result<Vec<BrokerOrderSnapshot>> {
        Ok(self
            .orders
            .values()
            .filter(|o| !matches!(o.state, BrokerOrderState::Filled | BrokerOrderState::Canceled | BrokerOrderState::Rejected))
            .cloned()
            .collect())
    }

    fn submit_limit_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        _limit_price: Micros,
    ) -> anyhow::Result<BrokerOrderSnapshot> {
        self.submit(client_order_id, symbol, side, qty, BrokerOrderKind::Limit)
    }

    fn submit_stop_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        _stop_price: Micros,
    ) -> anyhow::Result<BrokerOrderSnapshot> {
        self.submit(client_order_id, symbol, side, qty, BrokerOrderKind::Stop)
    }

    fn submit_target_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
        _target_price: Micros,
    ) -> anyhow::Result<BrokerOrderSnapshot> {
        self.submit(client_order_id, symbol, side, qty, BrokerOrderKind::Target)
    }

    fn submit_flatten_order(
        &mut self,
        client_order_id: &str,
        symbol: &str,
        side: Side,
        qty: i64,
    ) -> anyhow::Result<BrokerOrderSnapshot> {
        self.submit(client_order_id, symbol, side, qty, BrokerOrderKind::MarketEquivalentFlatten)
    }

    fn cancel_order(&mut self, broker_order_id: &str) -> anyhow::Result<()> {
        if let Some(order) = self.orders.get_mut(broker_order_id) {
            if !matches!(order.state, BrokerOrderState::Filled | BrokerOrderState::Canceled | BrokerOrderState::Rejected) {
                order.state = BrokerOrderState::Canceled;
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<BrokerEvent> {
        self.events.drain(..).collect()
    }
}
