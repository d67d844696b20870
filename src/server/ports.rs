// Port reconciliation module
// Converges the set of listening sockets onto the configured <bind> entries

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use serde::Serialize;
use socket2::Socket;

use super::port_parser::expand_ports;
use crate::config::BindSpec;
use crate::error::{BindError, ReconcileError};
use crate::logger;
use crate::net::{
    normalize_wildcard, open_stream_socket, raw_descriptor, BindTarget, SocketAddress,
    SocketBinder, SocketEngine,
};

/// A bound, listening client socket
#[derive(Debug)]
pub struct ListeningSocket {
    socket: Socket,
    address: SocketAddress,
    descriptor: String,
    description: String,
    bound_at: DateTime<Local>,
}

impl ListeningSocket {
    pub const fn socket(&self) -> &Socket {
        &self.socket
    }

    pub const fn address(&self) -> &SocketAddress {
        &self.address
    }

    /// Bind descriptor, the identity used during reconciliation
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fd(&self) -> i64 {
        raw_descriptor(&self.socket)
    }

    pub const fn bound_at(&self) -> DateTime<Local> {
        self.bound_at
    }

    /// Status snapshot for reporting
    pub fn status(&self) -> PortStatus {
        PortStatus {
            descriptor: self.descriptor.clone(),
            family: self.address.family(),
            description: self.description.clone(),
            fd: self.fd(),
            bound_at: self.bound_at,
        }
    }
}

/// Serializable view of one listener
#[derive(Debug, Clone, Serialize)]
pub struct PortStatus {
    pub descriptor: String,
    pub family: &'static str,
    pub description: String,
    pub fd: i64,
    pub bound_at: DateTime<Local>,
}

/// A port that could not be bound during a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPort {
    pub descriptor: String,
    pub reason: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Newly bound listeners
    pub bound: usize,
    /// Listeners left open because the config still declares them
    pub retained: Vec<String>,
    /// Listeners closed because the config no longer declares them
    pub removed: Vec<String>,
    pub failed: Vec<FailedPort>,
}

impl ReconcileReport {
    /// Number of client ports the configuration asked for in this pass
    pub fn requested(&self) -> usize {
        self.bound + self.retained.len() + self.failed.len()
    }

    /// Operator-facing failure report, `None` when every port bound
    pub fn failure_summary(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let header = format!(
            "{} of {} ports failed to bind",
            self.failed.len(),
            self.requested()
        );
        let lines = self
            .failed
            .iter()
            .map(|f| format!("  {}: {}", f.descriptor, f.reason));
        Some(std::iter::once(header).chain(lines).collect::<Vec<_>>().join("\n"))
    }
}

/// Owner of the active client listeners.
///
/// Only reconciliation adds or closes listeners; everything else gets read
/// access. Callers must not run two passes concurrently.
#[derive(Debug)]
pub struct PortReconciler<E> {
    binder: SocketBinder<E>,
    ports: BTreeMap<String, ListeningSocket>,
}

impl<E: SocketEngine> PortReconciler<E> {
    pub const fn new(binder: SocketBinder<E>) -> Self {
        Self {
            binder,
            ports: BTreeMap::new(),
        }
    }

    pub const fn binder(&self) -> &SocketBinder<E> {
        &self.binder
    }

    /// Backlog used for listeners bound from now on
    pub fn set_backlog(&mut self, backlog: i32) {
        self.binder.set_backlog(backlog);
    }

    /// Bind new ports, keep unchanged ones, and close ports the config dropped.
    ///
    /// Per-port failures are collected in the report. An error is returned only
    /// when the close phase finds its bookkeeping out of step with the active
    /// set; the close loop stops at that point.
    pub fn reconcile(&mut self, specs: &[BindSpec]) -> Result<ReconcileReport, ReconcileError> {
        let mut previous: BTreeSet<String> = self.ports.keys().cloned().collect();
        let mut seen = BTreeSet::new();
        let mut report = ReconcileReport::default();

        for spec in specs.iter().filter(|s| s.is_client_port()) {
            if spec.address.starts_with("::ffff:") {
                logger::log_4in6_address(&spec.address);
            }
            let address = normalize_wildcard(&spec.address);

            for port in expand_ports(&spec.port) {
                self.reconcile_port(spec, address, port, &mut previous, &mut seen, &mut report);
            }
        }

        self.close_removed(previous, &mut report)?;

        logger::log_reconcile_summary(report.bound, report.failed.len(), self.ports.len());
        Ok(report)
    }

    fn reconcile_port(
        &mut self,
        spec: &BindSpec,
        address: &str,
        port: u16,
        previous: &mut BTreeSet<String>,
        seen: &mut BTreeSet<String>,
        report: &mut ReconcileReport,
    ) {
        let descriptor = match SocketAddress::from_text(address, port) {
            Ok(addr) => addr.to_user_string(),
            Err(e) => {
                report.failed.push(FailedPort {
                    descriptor: format!("{address}:{port}"),
                    reason: e.to_string(),
                });
                return;
            }
        };

        // A descriptor declared twice is handled once, whatever the first outcome was
        if !seen.insert(descriptor.clone()) {
            return;
        }
        if previous.remove(&descriptor) {
            logger::log_port_retained(&descriptor);
            report.retained.push(descriptor);
            return;
        }

        match self.open_listener(address, port) {
            Ok((socket, addr)) => {
                let description = spec.description_or_default().to_string();
                logger::log_port_bound(&descriptor, &description);
                self.ports.insert(
                    descriptor.clone(),
                    ListeningSocket {
                        socket,
                        address: addr,
                        descriptor,
                        description,
                        bound_at: Local::now(),
                    },
                );
                report.bound += 1;
            }
            Err(e) => report.failed.push(FailedPort {
                descriptor,
                reason: e.to_string(),
            }),
        }
    }

    fn open_listener(&self, address: &str, port: u16) -> Result<(Socket, SocketAddress), BindError> {
        let socket = open_stream_socket(address)?;
        let addr = self
            .binder
            .bind(&socket, BindTarget::Address { address, port }, true)?;
        Ok((socket, addr))
    }

    fn close_removed(
        &mut self,
        previous: BTreeSet<String>,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        for descriptor in previous {
            let Some(listener) = self.ports.remove(&descriptor) else {
                logger::log_invariant_violation(&descriptor);
                return Err(ReconcileError::InvariantViolation { descriptor });
            };
            logger::log_port_removed(listener.descriptor());
            drop(listener);
            report.removed.push(descriptor);
        }
        Ok(())
    }

    /// Close every listener, used at shutdown
    pub fn close_all(&mut self) -> usize {
        let count = self.ports.len();
        self.ports.clear();
        count
    }

    pub fn get(&self, descriptor: &str) -> Option<&ListeningSocket> {
        self.ports.get(descriptor)
    }

    /// Listeners ordered by descriptor
    pub fn iter(&self) -> impl Iterator<Item = &ListeningSocket> {
        self.ports.values()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn status(&self) -> Vec<PortStatus> {
        self.iter().map(ListeningSocket::status).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Socket2Engine;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io;

    /// Pretends every bind succeeds except for the listed ports
    #[derive(Default)]
    struct FakeEngine {
        refuse: HashSet<u16>,
        binds: RefCell<Vec<u16>>,
        blocking_only: bool,
    }

    impl SocketEngine for FakeEngine {
        fn bind(&self, _: &Socket, addr: &socket2::SockAddr, _: usize) -> io::Result<()> {
            let port = addr.as_socket().map_or(0, |a| a.port());
            self.binds.borrow_mut().push(port);
            if self.refuse.contains(&port) {
                return Err(io::Error::from(io::ErrorKind::AddrInUse));
            }
            Ok(())
        }

        fn listen(&self, _: &Socket, _: i32) -> io::Result<()> {
            Ok(())
        }

        fn set_nonblocking(&self, _: &Socket) -> io::Result<()> {
            if self.blocking_only {
                return Err(io::Error::from(io::ErrorKind::Unsupported));
            }
            Ok(())
        }
    }

    fn reconciler() -> PortReconciler<FakeEngine> {
        PortReconciler::new(SocketBinder::new(FakeEngine::default(), 128))
    }

    fn refusing(ports: &[u16]) -> PortReconciler<FakeEngine> {
        let engine = FakeEngine {
            refuse: ports.iter().copied().collect(),
            ..Default::default()
        };
        PortReconciler::new(SocketBinder::new(engine, 128))
    }

    fn clients(port: &str, address: &str) -> BindSpec {
        BindSpec::new(port, address).with_kind("clients")
    }

    fn fds(r: &PortReconciler<FakeEngine>) -> Vec<(String, i64)> {
        r.iter().map(|l| (l.descriptor().to_string(), l.fd())).collect()
    }

    #[test]
    fn test_binds_new_ports() {
        let mut r = reconciler();
        let report = r
            .reconcile(&[clients("6667", "*"), clients("6697", "*")])
            .unwrap();
        assert_eq!(report.bound, 2);
        assert!(report.failed.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(r.len(), 2);
        assert!(r.get("*:6667").is_some());
        assert!(r.get("*:6697").is_some());
        assert_eq!(r.get("*:6667").unwrap().description(), "plaintext");
    }

    #[test]
    fn test_unchanged_port_is_not_rebound() {
        let mut r = reconciler();
        r.reconcile(&[clients("6667-6668", "*")]).unwrap();
        let fd_6667 = r.get("*:6667").unwrap().fd();
        let binds_before = r.binder().engine().binds.borrow().len();

        let report = r.reconcile(&[clients("6667", "*")]).unwrap();
        assert_eq!(report.bound, 0);
        assert_eq!(report.retained, vec!["*:6667".to_string()]);
        assert_eq!(report.removed, vec!["*:6668".to_string()]);
        assert_eq!(r.get("*:6667").unwrap().fd(), fd_6667);
        assert!(r.get("*:6668").is_none());
        assert_eq!(r.binder().engine().binds.borrow().len(), binds_before);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut r = reconciler();
        let specs = [clients("6667", ""), clients("6697", "127.0.0.1").with_description("gnutls")];
        r.reconcile(&specs).unwrap();
        let before = fds(&r);

        let report = r.reconcile(&specs).unwrap();
        assert_eq!(report.bound, 0);
        assert!(report.removed.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(report.retained.len(), 2);
        assert_eq!(fds(&r), before);
        assert_eq!(r.get("127.0.0.1:6697").unwrap().description(), "gnutls");
    }

    #[test]
    fn test_invalid_address_does_not_block_others() {
        let mut r = reconciler();
        let report = r
            .reconcile(&[clients("6667", "999.999.999.999"), clients("6668", "*")])
            .unwrap();
        assert_eq!(report.bound, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].descriptor, "999.999.999.999:6667");
        assert!(report.failed[0].reason.contains("invalid address"));
        assert_eq!(r.len(), 1);
        assert!(r.get("*:6668").is_some());
    }

    #[test]
    fn test_bind_failure_is_reported_per_port() {
        let mut r = refusing(&[6668]);
        let report = r.reconcile(&[clients("6667-6669", "*")]).unwrap();
        assert_eq!(report.bound, 2);
        assert_eq!(
            report.failed,
            vec![FailedPort {
                descriptor: "*:6668".to_string(),
                reason: io::Error::from(io::ErrorKind::AddrInUse).to_string(),
            }]
        );
        assert!(r.get("*:6668").is_none());
        assert_eq!(report.requested(), 3);

        let summary = report.failure_summary().unwrap();
        assert!(summary.starts_with("1 of 3 ports failed to bind"));
        assert!(summary.contains("*:6668: "));
    }

    #[test]
    fn test_no_failure_summary_when_clean() {
        let mut r = reconciler();
        let report = r.reconcile(&[clients("6667", "*")]).unwrap();
        assert_eq!(report.failure_summary(), None);
    }

    #[test]
    fn test_backlog_update_applies_to_binder() {
        let mut r = reconciler();
        r.set_backlog(512);
        assert_eq!(r.binder().backlog(), 512);
    }

    #[test]
    fn test_duplicate_descriptor_binds_once() {
        let mut r = reconciler();
        let report = r
            .reconcile(&[clients("6667", "*"), clients("6660-6670", "")])
            .unwrap();
        assert_eq!(report.bound, 11);
        assert!(report.failed.is_empty());
        assert_eq!(r.len(), 11);
        let binds = r.binder().engine().binds.borrow();
        assert_eq!(binds.iter().filter(|&&p| p == 6667).count(), 1);
    }

    #[test]
    fn test_duplicate_after_failure_reported_once() {
        let mut r = refusing(&[6667]);
        let report = r
            .reconcile(&[clients("6667", "*"), clients("6667", "")])
            .unwrap();
        assert_eq!(report.bound, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].descriptor, "*:6667");
        assert_eq!(report.requested(), 1);
        assert_eq!(*r.binder().engine().binds.borrow(), vec![6667]);
        assert!(report
            .failure_summary()
            .unwrap()
            .starts_with("1 of 1 ports failed to bind"));
        assert!(r.is_empty());
    }

    #[test]
    fn test_nonblocking_failure_leaves_port_unbound() {
        let engine = FakeEngine {
            blocking_only: true,
            ..Default::default()
        };
        let mut r = PortReconciler::new(SocketBinder::new(engine, 128));
        let report = r.reconcile(&[clients("6667", "*")]).unwrap();
        assert_eq!(report.bound, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].descriptor, "*:6667");
        assert!(report.failed[0].reason.contains("non-blocking"));
        assert!(r.is_empty());
    }

    #[test]
    fn test_non_client_types_ignored() {
        let mut r = reconciler();
        let report = r
            .reconcile(&[
                BindSpec::new("7000", "*").with_kind("servers"),
                BindSpec::new("6667", "*"),
            ])
            .unwrap();
        assert_eq!(report.bound, 1);
        assert!(r.get("*:7000").is_none());
    }

    #[test]
    fn test_ipv6_descriptor_key() {
        let mut r = reconciler();
        r.reconcile(&[clients("6697", "::1")]).unwrap();
        let listener = r.get("[::1]:6697").unwrap();
        assert_eq!(listener.address().family(), "IPv6");
    }

    #[test]
    fn test_empty_config_closes_everything() {
        let mut r = reconciler();
        r.reconcile(&[clients("6667,6697", "*")]).unwrap();
        let report = r.reconcile(&[]).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert!(r.is_empty());
    }

    #[test]
    fn test_missing_entry_aborts_close() {
        let mut r = reconciler();
        r.reconcile(&[clients("6667", "*")]).unwrap();
        let previous: BTreeSet<String> =
            ["*:1".to_string(), "*:6667".to_string()].into_iter().collect();
        let mut report = ReconcileReport::default();

        let err = r.close_removed(previous, &mut report).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InvariantViolation {
                descriptor: "*:1".to_string()
            }
        );
        // The close loop stopped before reaching *:6667
        assert!(r.get("*:6667").is_some());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_status_snapshot() {
        let mut r = reconciler();
        r.reconcile(&[clients("6697", "*").with_description("openssl"), clients("6667", "*")])
            .unwrap();
        let status = r.status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].descriptor, "*:6667");
        assert_eq!(status[1].description, "openssl");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""descriptor":"*:6697""#));
    }

    #[test]
    fn test_close_all() {
        let mut r = reconciler();
        r.reconcile(&[clients("6667,6697", "*")]).unwrap();
        assert_eq!(r.close_all(), 2);
        assert!(r.is_empty());
    }

    fn free_ports() -> (u16, u16) {
        let a = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let b = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        (a.local_addr().unwrap().port(), b.local_addr().unwrap().port())
    }

    #[test]
    fn test_real_listeners_survive_reload() {
        let (a, b) = free_ports();
        let mut r = PortReconciler::new(SocketBinder::new(Socket2Engine, 16));
        let specs = [clients(&a.to_string(), "127.0.0.1"), clients(&b.to_string(), "127.0.0.1")];

        let report = r.reconcile(&specs).unwrap();
        assert_eq!(report.bound, 2, "failures: {:?}", report.failed);
        let key_a = format!("127.0.0.1:{a}");
        let fd_a = r.get(&key_a).unwrap().fd();

        // A client can connect while the listener is retained across a reload
        let client = std::net::TcpStream::connect(("127.0.0.1", a)).unwrap();
        let report = r.reconcile(&specs[..1]).unwrap();
        assert_eq!(report.retained, vec![key_a.clone()]);
        assert_eq!(report.removed, vec![format!("127.0.0.1:{b}")]);
        assert_eq!(r.get(&key_a).unwrap().fd(), fd_a);
        drop(client);
    }
}
