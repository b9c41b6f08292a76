/// Network interface metrics from /proc/net/dev
use std::path::Path;

use crate::constants::{BYTES_PER_MIB, NET_DEV_PATH};
use crate::error::{ReadError, Result};
use crate::procfs::{parse_u64_fields, require_fields, ProcFs};
use crate::rate::{open_window, CounterSet, Interval};
use crate::report::{CheckResult, PerfData};
use crate::store::{MetricKind, SampleStore, SourceKey};
use crate::threshold::{evaluate_all, Status, Threshold};

/// Header lines before the first interface row
const HEADER_LINES: usize = 2;

/// Receive and transmit columns of one interface row
const NET_FIELDS: usize = 16;

/// Counters whose growth means packets are being lost or mangled
const ERROR_FIELDS: [&str; 9] = [
    "r_errs", "r_drop", "r_fifo", "r_frame", "t_errs", "t_drop", "t_fifo", "t_colls", "t_carrier",
];

/// All sixteen /proc/net/dev columns for one interface, in kernel order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetCounters {
    pub fields: [u64; NET_FIELDS],
}

impl NetCounters {
    fn get(&self, name: &str) -> u64 {
        Self::FIELDS
            .iter()
            .position(|field| *field == name)
            .map_or(0, |idx| self.fields[idx])
    }
}

impl CounterSet for NetCounters {
    const KIND: MetricKind = MetricKind::Net;
    const FIELDS: &'static [&'static str] = &[
        "r_bytes",
        "r_packets",
        "r_errs",
        "r_drop",
        "r_fifo",
        "r_frame",
        "r_compressed",
        "r_multicast",
        "t_bytes",
        "t_packets",
        "t_errs",
        "t_drop",
        "t_fifo",
        "t_colls",
        "t_carrier",
        "t_compressed",
    ];

    fn counters(&self) -> Vec<u64> {
        self.fields.to_vec()
    }

    fn from_counters(c: &[u64]) -> Self {
        let mut fields = [0; NET_FIELDS];
        fields.copy_from_slice(&c[..NET_FIELDS]);
        NetCounters { fields }
    }
}

/// Throughput over one sampling interval
#[derive(Debug, Clone, PartialEq)]
pub struct NetRates {
    pub rx_mib_s: f64,
    pub rx_packets_s: f64,
    pub tx_mib_s: f64,
    pub tx_packets_s: f64,
    /// Error counters that grew, with their deltas
    pub errors: Vec<(&'static str, u64)>,
}

impl NetRates {
    pub fn error_total(&self) -> u64 {
        self.errors.iter().map(|(_, n)| n).sum()
    }
}

/// Find `iface` in /proc/net/dev content; names before the colon must match exactly.
fn parse_interface(
    data: &str,
    iface: &str,
    path: &Path,
) -> std::result::Result<NetCounters, ReadError> {
    for line in data.lines().skip(HEADER_LINES) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        if name.trim() != iface {
            continue;
        }
        let fields = parse_u64_fields(rest.split_whitespace(), path)?;
        require_fields(&fields, NET_FIELDS, path, iface)?;
        return Ok(NetCounters::from_counters(&fields));
    }
    Err(ReadError::not_found("Network device", iface))
}

pub fn collect_interface(
    procfs: &ProcFs,
    iface: &str,
) -> std::result::Result<NetCounters, ReadError> {
    let data = procfs.read(NET_DEV_PATH)?;
    parse_interface(&data, iface, &procfs.path(NET_DEV_PATH))
}

/// Calculate throughput and error growth between two samples
pub fn calculate_network_rates(
    prev: &NetCounters,
    curr: &NetCounters,
    interval: &Interval,
) -> NetRates {
    let rate = |name: &str| interval.rate(prev.get(name), curr.get(name));
    let errors = ERROR_FIELDS
        .into_iter()
        .filter_map(|name| {
            let grown = curr.get(name).saturating_sub(prev.get(name));
            (grown > 0).then_some((name, grown))
        })
        .collect();

    NetRates {
        rx_mib_s: rate("r_bytes") / BYTES_PER_MIB,
        rx_packets_s: rate("r_packets"),
        tx_mib_s: rate("t_bytes") / BYTES_PER_MIB,
        tx_packets_s: rate("t_packets"),
        errors,
    }
}

/// `network <iface> [wrx,wtx crx,ctx]`: errors trump bandwidth.
///
/// Any error counter that grew makes the result critical and bandwidth
/// limits are not consulted at all.
pub fn check_network(
    procfs: &ProcFs,
    store: &SampleStore,
    iface: &str,
    thresholds: &[Threshold],
) -> Result<CheckResult> {
    let current = collect_interface(procfs, iface)?;
    let key = SourceKey::keyed("net", iface);

    let window = open_window(store, &key, &current)?;
    let (previous, interval) = match window.ready_or_report(Some(key.as_str())) {
        Ok(ready) => ready,
        Err(result) => return Ok(result),
    };
    let rates = calculate_network_rates(&previous, &current, &interval);

    let mut summary = format!(
        "{iface} Rx: {:.2} MB/s ({:.2} p/s) Tx: {:.2} MB/s ({:.2} p/s) [t:{:.2}]",
        rates.rx_mib_s,
        rates.rx_packets_s,
        rates.tx_mib_s,
        rates.tx_packets_s,
        interval.seconds()
    );

    let (rx_limit, tx_limit) = (thresholds.first(), thresholds.get(1));
    let status = if rates.errors.is_empty() {
        let bandwidth = evaluate_all([(rates.rx_mib_s, rx_limit), (rates.tx_mib_s, tx_limit)]);
        if !thresholds.is_empty() {
            summary.push_str(match bandwidth {
                Status::Critical => " (Critical BW)",
                Status::Warning => " (Warning BW)",
                _ => " (OK)",
            });
        }
        bandwidth
    } else {
        for (name, grown) in &rates.errors {
            summary.push_str(&format!(" (Critical {name}:{grown})"));
        }
        Status::Critical
    };

    let perfdata = vec![
        PerfData::new("RX_MBps", rates.rx_mib_s).threshold(rx_limit),
        PerfData::new("RX_PKps", rates.rx_packets_s),
        PerfData::new("TX_MBps", rates.tx_mib_s).threshold(tx_limit),
        PerfData::new("TX_PKps", rates.tx_packets_s),
        PerfData::new("PK_ERRORS", rates.error_total() as f64),
    ];
    CheckResult::new(status, summary, perfdata).ensure_finite()
}
