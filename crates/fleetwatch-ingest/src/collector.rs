//! NetFlow v5 UDP collector.
//!
//! Listens on a UDP socket, parses each datagram and persists flows for
//! the hosts it can attribute by source IP. Flows from unknown exporters
//! are dropped. One bad datagram never takes the collector down.

use std::sync::Arc;

use fleetwatch_alerts::AlertEngine;
use fleetwatch_common::{FlowSource, FlowStore, HostStore, NetworkFlow, StoreError};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::netflow::{parse_v5, protocol_name};
use crate::IngestError;

/// Datagram receive buffer; a v5 export never exceeds this.
const MAX_DATAGRAM: usize = 65_535;

/// Parse one datagram and persist the attributable flows.
///
/// Returns the number of flow records persisted. Flows are grouped per
/// host and each group runs through the alert engine.
pub async fn process_datagram<S>(
    store: &S,
    engine: &AlertEngine,
    data: &[u8],
) -> Result<usize, StoreError>
where
    S: HostStore + FlowStore + ?Sized,
{
    let Some(packet) = parse_v5(data) else {
        return Ok(0);
    };

    // Group attributable flows per host; unknown source IPs drop out.
    let mut per_host: Vec<(fleetwatch_common::Host, Vec<NetworkFlow>)> = Vec::new();
    for record in &packet.records {
        let src = record.src_addr.to_string();
        let Some(host) = store.find_by_ip(&src).await? else {
            debug!(ip = %src, "no host matches netflow source, dropping record");
            continue;
        };
        let flow = NetworkFlow {
            id: Uuid::new_v4(),
            host_id: host.id,
            hostname: host.hostname.clone(),
            pid: None,
            process: Some("netflow".into()),
            protocol: protocol_name(record.protocol).into(),
            local_address: src,
            local_port: record.src_port,
            remote_address: record.dst_addr.to_string(),
            remote_port: record.dst_port,
            bytes_in: 0,
            bytes_out: record.octets as u64,
            packets_in: 0,
            packets_out: record.packets as u64,
            source: FlowSource::NetFlow,
            timestamp: packet.timestamp,
        };
        match per_host.iter_mut().find(|(h, _)| h.id == host.id) {
            Some((_, flows)) => flows.push(flow),
            None => per_host.push((host, vec![flow])),
        }
    }

    let mut persisted = 0;
    for (host, flows) in per_host {
        persisted += store.insert_flows(flows.clone()).await?;
        // Best effort: an alert-store failure never undoes or blocks the
        // flow persistence for this or the remaining hosts.
        if let Err(err) = engine.evaluate_network(&host, &flows).await {
            warn!(%err, hostname = %host.hostname, "alert evaluation failed");
        }
    }
    Ok(persisted)
}

/// Long-running UDP collector task.
pub struct NetFlowCollector<S> {
    store: Arc<S>,
    engine: Arc<AlertEngine>,
}

impl<S> NetFlowCollector<S>
where
    S: HostStore + FlowStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, engine: Arc<AlertEngine>) -> Self {
        Self { store, engine }
    }

    /// Bind and serve until the task is aborted.
    pub async fn run(self, bind_addr: &str) -> Result<(), IngestError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!(addr = %bind_addr, "netflow collector listening");
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = socket.recv_from(&mut buf).await?;
            match process_datagram(self.store.as_ref(), &self.engine, &buf[..len]).await {
                Ok(0) => {}
                Ok(n) => debug!(records = n, exporter = %peer, "netflow datagram ingested"),
                Err(err) => warn!(%err, exporter = %peer, "failed to ingest netflow datagram"),
            }
        }
    }
}
