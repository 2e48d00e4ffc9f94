use crate::config::PipelineConfig;
use crate::model::{NetworkAnomaly, PacketRecord, Severity};

use super::{anomaly_id, AnomalyDetector};

/// Ports considered insecure (plaintext protocol or legacy service) (§4.5).
const INSECURE_PORTS: &[u16] = &[
    21, 23, 25, 80, 110, 139, 143, 389, 445, 512, 513, 514, 1433, 1521, 3306, 3389, 5432, 5900,
    6379, 8080, 9200, 11211, 27017,
];

/// Telnet/FTP/NetBIOS escalate to Critical; SMB/RDP/RPC/databases to High;
/// everything else on the table is Medium (§4.5).
fn severity_for_port(port: u16) -> Severity {
    match port {
        21 | 23 | 139 => Severity::Critical,
        445 | 3389 | 512 | 513 | 514 | 1433 | 1521 | 3306 | 5432 | 27017 => Severity::High,
        _ => Severity::Medium,
    }
}

fn service_name(port: u16) -> &'static str {
    match port {
        21 => "FTP",
        23 => "Telnet",
        25 => "SMTP",
        80 => "HTTP",
        110 => "POP3",
        139 => "NetBIOS",
        143 => "IMAP",
        389 => "LDAP",
        445 => "SMB",
        512 | 513 | 514 => "rexec/rlogin/syslog",
        1433 => "MSSQL",
        1521 => "Oracle",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        6379 => "Redis",
        8080 => "HTTP-alt",
        9200 => "Elasticsearch",
        11211 => "memcached",
        27017 => "MongoDB",
        _ => "unknown",
    }
}

/// Flags traffic on well-known insecure ports, escalating severity for
/// the riskiest legacy protocols (§4.5).
pub struct UnencryptedServiceDetector;

impl AnomalyDetector for UnencryptedServiceDetector {
    fn name(&self) -> &'static str {
        "unencrypted-service"
    }

    fn category(&self) -> &'static str {
        "exposure"
    }

    fn detect(&self, packets: &[PacketRecord], _config: &PipelineConfig) -> Vec<NetworkAnomaly> {
        let mut anomalies = Vec::new();
        let mut ordinal = 0usize;
        for packet in packets {
            let port = INSECURE_PORTS
                .iter()
                .copied()
                .find(|p| *p == packet.src_port || *p == packet.dst_port);
            let Some(port) = port else {
                continue;
            };
            ordinal += 1;
            anomalies.push(NetworkAnomaly {
                id: anomaly_id(self.name(), ordinal),
                detected_at_ns: packet.timestamp_ns,
                severity: severity_for_port(port),
                anomaly_type: "unencrypted-service".to_string(),
                description: format!(
                    "plaintext {} traffic observed on port {port} ({} -> {})",
                    service_name(port),
                    packet.src_addr,
                    packet.dst_addr
                ),
                src_addr: Some(packet.src_addr),
                dst_addr: Some(packet.dst_addr),
                affected_frames: vec![packet.frame_number],
                evidence: format!("port={port}"),
                recommendation: "Migrate this service to an encrypted transport or restrict access.".to_string(),
            });
        }
        anomalies
    }
}
