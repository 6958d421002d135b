#![allow(dead_code)]

pub mod adder;

use async_std::task;

use adder::{Adder, AdderService};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Start an adder server on an ephemeral port and return the port.
pub async fn start_adder() -> easyrpc::Result<u16> {
    let bound = easyrpc::on(AdderService, Adder, "127.0.0.1", 0).bind().await?;
    let port = bound.local_addr()?.port();
    task::spawn(bound.run());
    Ok(port)
}

/// A port nothing listens on.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
