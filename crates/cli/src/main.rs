//! # CLI — SiltKV interactive shell
//!
//! A REPL-style command-line interface for the SiltKV storage engine.
//! Reads commands from stdin, executes them against the store, and prints
//! results to stdout. Works interactively or scripted (pipe commands via
//! stdin).
//!
//! ## Commands
//!
//! ```text
//! PUT key value   Insert or update a key-value pair
//! GET key         Look up a key (prints value or "(nil)")
//! DEL key         Delete a key (writes a tombstone)
//! STATS           Print memtable and sstable counters
//! EXIT / QUIT     Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! SILT_DATA_DIR         Data directory               (default: "data")
//! SILT_FLUSH_THRESHOLD  Flush threshold in keys      (default: 1024)
//! SILT_COMPACT_TRIGGER  SSTable count that triggers  (default: 4)
//! SILT_COMPACT_BATCH    Tables merged per round      (default: 2)
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use engine::{Compactor, Flusher, Store};
use lockmgr::LockManager;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let data_dir = env_or("SILT_DATA_DIR", "data");
    let flush_threshold: usize = env_or("SILT_FLUSH_THRESHOLD", "1024")
        .parse()
        .unwrap_or(1024);
    let compact_trigger: usize = env_or("SILT_COMPACT_TRIGGER", "4").parse().unwrap_or(4);
    let compact_batch: usize = env_or("SILT_COMPACT_BATCH", "2").parse().unwrap_or(2);

    let lock_mgr = Arc::new(LockManager::new());
    let store = Arc::new(Store::open(&data_dir, Arc::clone(&lock_mgr))?);

    let flusher = Flusher::for_store(&store, flush_threshold);
    let compactor = Compactor::new(store.data_dir(), compact_trigger, compact_batch, lock_mgr);
    compactor.set_store(&store);
    flusher.start()?;
    compactor.start()?;

    println!(
        "SiltKV started (dir={}, flush={} keys, compact trigger={}, batch={})",
        data_dir, flush_threshold, compact_trigger, compact_batch
    );
    println!("Commands: PUT key value | GET key | DEL key | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "PUT" => {
                    if let Some(k) = parts.next() {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            println!("ERR usage: PUT key value");
                        } else {
                            match store.put(k.as_bytes().to_vec(), v.into_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR put failed: {}", e),
                            }
                        }
                    } else {
                        println!("ERR usage: PUT key value");
                    }
                }
                "GET" => {
                    if let Some(k) = parts.next() {
                        match store.get(k.as_bytes()) {
                            Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(k) = parts.next() {
                        match store.del(k.as_bytes().to_vec()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR del failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "STATS" => {
                    println!(
                        "memtable_keys={} frozen={} sstables={}",
                        store.memtable_size(),
                        store.immutable_table().is_occupied(),
                        store.sstable_count()
                    );
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    flusher.stop()?;
    compactor.stop()?;
    Ok(())
}
