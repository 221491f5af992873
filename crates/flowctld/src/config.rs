//! Command-line configuration
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-6: Configuration Settings - Validated listen addresses and log level

use crate::error::{FlowCtlError, Result};
use clap::Parser;
use std::net::SocketAddr;

/// Default management API listen address
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:8080";

/// Default OpenFlow listen address
pub const DEFAULT_OFP_ADDR: &str = "0.0.0.0:6633";

#[derive(Debug, Clone, Parser)]
#[command(name = "flowctld", version, about = "OpenFlow flow-rule controller")]
pub struct Config {
    /// Address the REST management API listens on
    #[arg(long, env = "FLOWCTL_REST_ADDR", default_value = DEFAULT_REST_ADDR)]
    pub rest_addr: String,

    /// Address switches connect to (OpenFlow 1.3)
    #[arg(long, env = "FLOWCTL_OFP_ADDR", default_value = DEFAULT_OFP_ADDR)]
    pub ofp_addr: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Listen addresses after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenAddrs {
    pub rest: SocketAddr,
    pub ofp: SocketAddr,
}

impl Config {
    pub fn listen_addrs(&self) -> Result<ListenAddrs> {
        Ok(ListenAddrs {
            rest: parse_addr("rest-addr", &self.rest_addr)?,
            ofp: parse_addr("ofp-addr", &self.ofp_addr)?,
        })
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| FlowCtlError::Config(format!("invalid {} {:?}: {}", field, value, e)))
}
