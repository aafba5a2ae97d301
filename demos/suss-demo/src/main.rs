//! Suss Demo
//!
//! Walks through:
//! - A local replica converting celsius to fahrenheit
//! - Three replicas writing the same node at once and settling by consensus
//! - Packing the settled network and restoring it
//! - A shadow object mirrored into a network and read back

use std::error::Error;

use suss_core::{Fields, Lineage, Value};
use suss_relations::StandardRelations;
use suss_runtime::{Replica, ReplicaConfig, TelemetryConfig};
use suss_test::{Simulator, SimulatorConfig};
use suss_wire::{digest, pack, unpack_with};
use tracing::info;

use suss_demo::{
    create_shadow_network, create_temperature_network, reading, sync_from_shadow, CELSIUS,
    FAHRENHEIT,
};

fn main() -> Result<(), Box<dyn Error>> {
    TelemetryConfig::default().init();

    println!("=== Suss Demo - Temperature Converter ===");
    println!();

    // Local replica
    let mut replica = Replica::new(ReplicaConfig::solo(), create_temperature_network());
    for (old, new) in [(25.0, 30.0), (30.0, 100.0)] {
        let outcome = replica.observe_local(
            CELSIUS,
            Value::number("celsius", old),
            Value::number("celsius", new),
        )?;
        println!(
            "observe celsius {old} -> {new}: {outcome:?}, fahrenheit = {:?}",
            reading(replica.network(), FAHRENHEIT)
        );
    }

    // Stale write: the node no longer holds 25
    let outcome = replica.observe_local(
        CELSIUS,
        Value::number("celsius", 25.0),
        Value::number("celsius", -40.0),
    )?;
    let lineage = replica.network().node(CELSIUS).map(|n| n.lineage);
    println!("observe celsius 25 -> -40: {outcome:?}, celsius now {lineage:?}");
    println!();

    // Concurrent writes across replicas
    println!("=== Three replicas, one conflicting write each ===");
    let mut sim = Simulator::quorum(SimulatorConfig::default(), &create_temperature_network());
    for i in 0..sim.len() {
        sim.write(i, CELSIUS, Value::number("celsius", 10.0 * (i + 1) as f64))?;
    }
    let report = sim.run_until_idle();
    info!(steps = report.steps, delivered = report.delivered, "simulation finished");

    for replica in sim.replicas() {
        let net = replica.network();
        let celsius = net.node(CELSIUS);
        println!(
            "{}: celsius = {:?} ({:?}), fahrenheit = {:?}",
            replica.id(),
            celsius.and_then(|n| n.value.as_number()),
            celsius.map(|n| n.lineage).unwrap_or(Lineage::Stale),
            reading(net, FAHRENHEIT),
        );
    }
    println!("converged: {}", sim.is_converged());
    println!();

    // Persistence
    println!("=== Pack and restore ===");
    let settled = sim.replica(0).network();
    let json = pack(settled)?;
    println!("packed {} bytes, digest {}", json.len(), digest(settled)?);
    let restored = unpack_with(&json, &StandardRelations::new())?;
    println!(
        "restored {} nodes, {} unresolved relations",
        restored.network.node_count(),
        restored.unresolved.len()
    );
    println!();

    // Shadow object
    println!("=== Shadow object ===");
    let object: Fields = serde_json::from_str(r#"{"name":"probe","reading":21.5,"online":true}"#)?;
    let shadow = create_shadow_network(&object);
    println!("shadow nodes: {}", shadow.node_count());
    println!("read back: {}", serde_json::to_string(&sync_from_shadow(&shadow))?);

    Ok(())
}
