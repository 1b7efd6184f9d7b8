//! NetFlow v5 datagram parsing.
//!
//! Header is 24 bytes, each flow record 48. The header's record count is
//! advisory: parsing stops at the last complete record, so a truncated
//! datagram yields the records that fit and drops the tail.

use std::net::Ipv4Addr;

use chrono::{DateTime, TimeZone, Utc};

const HEADER_LEN: usize = 24;
const RECORD_LEN: usize = 48;

/// One flow record from a v5 export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub packets: u32,
    pub octets: u32,
}

/// A parsed v5 datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetFlowPacket {
    /// Export time from the header (unix seconds).
    pub timestamp: DateTime<Utc>,
    pub records: Vec<FlowRecord>,
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_ipv4(data: &[u8], at: usize) -> Ipv4Addr {
    Ipv4Addr::new(data[at], data[at + 1], data[at + 2], data[at + 3])
}

/// Parse a NetFlow v5 datagram. `None` for short buffers or other
/// versions.
pub fn parse_v5(data: &[u8]) -> Option<NetFlowPacket> {
    if data.len() < HEADER_LEN {
        return None;
    }
    if read_u16(data, 0) != 5 {
        return None;
    }
    let count = read_u16(data, 2) as usize;
    let unix_secs = read_u32(data, 8);
    let timestamp = Utc
        .timestamp_opt(unix_secs as i64, 0)
        .single()
        .unwrap_or_else(Utc::now);

    let mut records = Vec::with_capacity(count);
    let mut offset = HEADER_LEN;
    for _ in 0..count {
        if offset + RECORD_LEN > data.len() {
            break;
        }
        records.push(FlowRecord {
            src_addr: read_ipv4(data, offset),
            dst_addr: read_ipv4(data, offset + 4),
            packets: read_u32(data, offset + 16),
            octets: read_u32(data, offset + 20),
            src_port: read_u16(data, offset + 32),
            dst_port: read_u16(data, offset + 34),
            protocol: data[offset + 38],
        });
        offset += RECORD_LEN;
    }
    Some(NetFlowPacket { timestamp, records })
}

/// IANA protocol number to the names used in flow records.
pub fn protocol_name(protocol: u8) -> &'static str {
    match protocol {
        1 => "icmp",
        6 => "tcp",
        17 => "udp",
        _ => "other",
    }
}

#[cfg(test)]
pub(crate) fn build_v5_packet(unix_secs: u32, records: &[FlowRecord]) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN + records.len() * RECORD_LEN];
    buf[0..2].copy_from_slice(&5u16.to_be_bytes());
    buf[2..4].copy_from_slice(&(records.len() as u16).to_be_bytes());
    buf[8..12].copy_from_slice(&unix_secs.to_be_bytes());
    for (i, rec) in records.iter().enumerate() {
        let at = HEADER_LEN + i * RECORD_LEN;
        buf[at..at + 4].copy_from_slice(&rec.src_addr.octets());
        buf[at + 4..at + 8].copy_from_slice(&rec.dst_addr.octets());
        buf[at + 16..at + 20].copy_from_slice(&rec.packets.to_be_bytes());
        buf[at + 20..at + 24].copy_from_slice(&rec.octets.to_be_bytes());
        buf[at + 32..at + 34].copy_from_slice(&rec.src_port.to_be_bytes());
        buf[at + 34..at + 36].copy_from_slice(&rec.dst_port.to_be_bytes());
        buf[at + 38] = rec.protocol;
    }
    buf
}
