//! Production adapters: external tool invocation and output parsing.
//!
//! Each adapter spawns one external program (`nslookup`, `ssh`/`srvctl`,
//! `sqlplus`) under a caller-supplied timeout and scans its textual output for
//! the one line that matters. The text parsers are separate functions so they
//! can be tested against captured tool output without any process spawning.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{ClusterQuery, InventoryEndpoint, InventoryLookup, LookupError, NameResolver};

/// Run a command to completion under `timeout`, feeding `stdin` when given.
/// Returns decoded stdout; a failed process with no stdout surfaces its stderr.
async fn run_command(
    mut cmd: Command,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<String, LookupError> {
    if timeout.is_zero() {
        // The caller's deadline expired before we got here.
        return Err(LookupError::Cancelled);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| LookupError::Tool(e.to_string()))?;
    if let (Some(payload), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(payload.as_bytes())
            .await
            .map_err(|e| LookupError::Tool(e.to_string()))?;
        // Dropping the pipe closes it so the child sees EOF.
    }

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| LookupError::Timeout(timeout))?
        .map_err(|e| LookupError::Tool(e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() && stdout.trim().is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LookupError::Tool(format!(
            "exit status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(stdout)
}

/// DNS adapter backed by the `nslookup` utility.
#[derive(Debug, Clone)]
pub struct NslookupResolver {
    program: String,
}

impl Default for NslookupResolver {
    fn default() -> Self {
        Self {
            program: "nslookup".to_string(),
        }
    }
}

impl NslookupResolver {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl NameResolver for NslookupResolver {
    async fn lookup_canonical_name(
        &self,
        host: &str,
        timeout: Duration,
    ) -> Result<String, LookupError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(host);
        debug!(host, "invoking nslookup");
        let output = run_command(cmd, None, timeout).await?;
        parse_canonical_name(&output).ok_or_else(|| {
            LookupError::NotFound(format!("no Name/Nom line in nslookup output for {host}"))
        })
    }
}

/// First usable canonical/alias line of `nslookup` output. Handles the
/// localised `Nom:` label and the `canonical name =` alias form.
fn parse_canonical_name(output: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("Name") || line.starts_with("Nom") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
        if let Some(at) = line.find("canonical name =") {
            let value = line[at + "canonical name =".len()..].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Cluster adapter: `ssh` to the canonical host and run `srvctl config scan`
/// under the oracle account.
#[derive(Debug, Clone)]
pub struct SrvctlClusterQuery {
    ssh_program: String,
    user: String,
}

impl Default for SrvctlClusterQuery {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            user: "oracle".to_string(),
        }
    }
}

impl SrvctlClusterQuery {
    pub fn with_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    /// Remote command: source the account's profile so `srvctl` is on PATH.
    fn remote_command(&self) -> String {
        format!(". /home/{}/.bash_profile ; srvctl config scan", self.user)
    }
}

impl ClusterQuery for SrvctlClusterQuery {
    async fn lookup_scan_name(
        &self,
        canonical_host: &str,
        timeout: Duration,
    ) -> Result<String, LookupError> {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .arg(format!("{}@{}", self.user, canonical_host))
            .arg(self.remote_command());
        debug!(host = canonical_host, "invoking srvctl config scan over ssh");
        let output = run_command(cmd, None, timeout).await?;
        parse_scan_name(&output).ok_or_else(|| {
            LookupError::NotFound(format!(
                "no SCAN name line in srvctl output for {canonical_host}"
            ))
        })
    }
}

/// `SCAN name:` line of `srvctl config scan` output.
fn parse_scan_name(output: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("SCAN name") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.split(',').next().unwrap_or(value).trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Fleet-inventory adapter: a fixed query piped to `sqlplus -s` against the
/// management repository, printing one `host|port` line per target.
#[derive(Debug, Clone)]
pub struct SqlplusInventory {
    program: String,
    connect: String,
}

impl SqlplusInventory {
    pub fn new(connect: impl Into<String>) -> Self {
        Self {
            program: "sqlplus".to_string(),
            connect: connect.into(),
        }
    }
}

impl InventoryLookup for SqlplusInventory {
    async fn lookup(
        &self,
        database_id: &str,
        timeout: Duration,
    ) -> Result<InventoryEndpoint, LookupError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-s").arg(&self.connect);
        debug!(target = database_id, "querying fleet inventory");
        let output = run_command(cmd, Some(&inventory_query(database_id)), timeout).await?;
        parse_endpoint_line(&output).ok_or_else(|| {
            LookupError::NotFound(format!("no inventory row for target {database_id}"))
        })
    }
}

fn inventory_query(database_id: &str) -> String {
    let escaped = database_id.replace('\'', "''");
    format!(
        "set pages 0\n\
         set head off\n\
         set feed off\n\
         set verify off\n\
         set trimspool on\n\
         set lines 400\n\
         select\n\
           max(case when lower(tp.property_name) like '%host%'\n\
                     or lower(tp.property_name) like '%machine%'\n\
                then tp.property_value end)\n\
           || '|' ||\n\
           max(case when lower(tp.property_name) like '%port%'\n\
                then tp.property_value end)\n\
         from sysman.mgmt$target t\n\
         join sysman.mgmt$target_properties tp\n\
           on tp.target_guid = t.target_guid\n\
         where t.target_name = '{escaped}';\n\
         exit\n"
    )
}

/// First non-blank data line of the inventory output, split on `|`. Oracle
/// error lines disqualify the whole output.
fn parse_endpoint_line(output: &str) -> Option<InventoryEndpoint> {
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("ORA-") || line.starts_with("SP2-") {
            return None;
        }
        let (host, port) = match line.split_once('|') {
            Some((h, p)) => (h.trim(), p.trim().parse().ok()),
            None => (line, None),
        };
        if host.is_empty() {
            return None;
        }
        return Some(InventoryEndpoint {
            host: host.to_string(),
            port,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_from_english_output() {
        let output = "Server:  dns1.corp.example.com\n\
                      Address:  10.0.0.53\n\
                      \n\
                      Name:    hosta.corp.example.com\n\
                      Address: 10.1.2.3\n";
        assert_eq!(
            parse_canonical_name(output),
            Some("hosta.corp.example.com".to_string())
        );
    }

    #[test]
    fn canonical_name_from_localised_output() {
        let output = "Serveur :  dns1.corp.example.com\n\
                      \n\
                      Nom :    hosta.corp.example.com\n\
                      Address: 10.1.2.3\n";
        assert_eq!(
            parse_canonical_name(output),
            Some("hosta.corp.example.com".to_string())
        );
    }

    #[test]
    fn canonical_name_from_cname_alias_form() {
        let output = "hosta.corp.example.com canonical name = real-host.corp.example.com.\n";
        assert_eq!(
            parse_canonical_name(output),
            Some("real-host.corp.example.com.".to_string())
        );
    }

    #[test]
    fn canonical_name_absent() {
        assert_eq!(parse_canonical_name("** server can't find hosta: NXDOMAIN\n"), None);
        assert_eq!(parse_canonical_name(""), None);
    }

    #[test]
    fn scan_name_from_srvctl_output() {
        let output = "SCAN name: scan-db1.corp.example.com, Network: 1\n\
                      SCAN VIP name: scan1, IP: /scan-db1/10.1.2.10\n";
        assert_eq!(
            parse_scan_name(output),
            Some("scan-db1.corp.example.com".to_string())
        );
    }

    #[test]
    fn scan_name_absent() {
        assert_eq!(parse_scan_name("PRCR-1001 : resource not found\n"), None);
    }

    #[test]
    fn remote_profile_follows_configured_user() {
        let default = SrvctlClusterQuery::default();
        assert_eq!(
            default.remote_command(),
            ". /home/oracle/.bash_profile ; srvctl config scan"
        );
        let grid = SrvctlClusterQuery::with_user("grid");
        assert!(grid.remote_command().starts_with(". /home/grid/.bash_profile"));
    }

    #[test]
    fn endpoint_line_with_port() {
        let ep = parse_endpoint_line("\n  hosta.corp.example.com|1521  \n").unwrap();
        assert_eq!(ep.host, "hosta.corp.example.com");
        assert_eq!(ep.port, Some(1521));
    }

    #[test]
    fn endpoint_line_without_port() {
        let ep = parse_endpoint_line("hosta.corp.example.com\n").unwrap();
        assert_eq!(ep.host, "hosta.corp.example.com");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn endpoint_line_rejects_oracle_errors() {
        assert!(parse_endpoint_line("ORA-00942: table or view does not exist\n").is_none());
        assert!(parse_endpoint_line("SP2-0306: Invalid option\n").is_none());
        assert!(parse_endpoint_line("").is_none());
    }

    #[test]
    fn inventory_query_escapes_quotes() {
        let q = inventory_query("O'DB");
        assert!(q.contains("'O''DB'"));
    }

    #[tokio::test]
    async fn run_command_captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello");
        let out = run_command(cmd, None, Duration::from_secs(5)).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn run_command_feeds_stdin() {
        let cmd = Command::new("cat");
        let out = run_command(cmd, Some("payload"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "payload");
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 5");
        let err = run_command(cmd, None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Timeout(_)));
    }

    #[tokio::test]
    async fn zero_timeout_is_cancellation() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hi");
        let err = run_command(cmd, None, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LookupError::Cancelled));
    }

    #[tokio::test]
    async fn missing_program_is_tool_error() {
        let cmd = Command::new("definitely-not-a-real-program-xyz");
        let err = run_command(cmd, None, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LookupError::Tool(_)));
    }
}
