use anyhow::Result;
use async_std::task;
use easyrpc::{ConnectionProvider, Session};
use env_logger::Env;
use log::*;
use std::env;

#[allow(dead_code)]
#[path = "../tests/common/adder.rs"]
mod adder;

use adder::{Adder, AdderService};

/// Print usage and exit.
fn usage() -> ! {
    println!("usage: cargo run --example adder -- [client|server] [port]");
    std::process::exit(1);
}

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mode = env::args().nth(1).unwrap_or_else(|| "server".into());
    let port = match env::args().nth(2) {
        Some(port) => port.parse().unwrap_or_else(|_| usage()),
        None => 10000,
    };

    task::block_on(async move {
        match mode.as_str() {
            "server" => server(port).await,
            "client" => client(port).await,
            _ => usage(),
        }
    })
}

async fn server(port: u16) -> Result<()> {
    easyrpc::on(AdderService, Adder, "localhost", port)
        .serve()
        .await?;
    Ok(())
}

async fn client(port: u16) -> Result<()> {
    let client = easyrpc::to(Adder, "localhost", port);
    info!("connecting to {}", client.address());

    let mut session = client.open().await?;
    let instant = std::time::Instant::now();
    let two = session.add_two(10, 20).await?;
    let three = session.add_three(10, 20, 30).await?;
    info!("calls took {:?}", instant.elapsed());
    session.close()?;

    println!("add_two(10, 20) = {}", two);
    println!("add_three(10, 20, 30) = {}", three);
    Ok(())
}
