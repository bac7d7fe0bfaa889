use clap::Parser;
use tracing::info;

use idalloc_raft::sim::SimCluster;
use idalloc_raft::NodeId;

/// Runs a simulated node-ID allocation cluster and reports the outcome.
/// Demonstrates wiring; real deployments embed the core behind their own
/// bus transport and storage backend.
#[derive(Parser)]
struct Args {
    /// Number of servers in the simulated cluster (1 to 5).
    #[arg(long, default_value_t = 3)]
    cluster_size: u8,

    /// Number of update rounds to run after the allocation is submitted.
    #[arg(long, default_value_t = 20)]
    ticks: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args = Args::parse();
    let mut cluster = SimCluster::new(args.cluster_size);

    // Let the staggered timeouts elect a leader.
    let mut elections = 0;
    while cluster.leader().is_none() && elections < 100 {
        cluster.run_ticks(1);
        elections += 1;
    }
    let Some(leader) = cluster.leader() else {
        info!("no leader elected; increase --ticks");
        return;
    };
    info!(leader = leader + 1, rounds = elections, "leader elected");

    // Submit one allocation and let it replicate and commit.
    cluster.append_log(leader, NodeId::new(42), [0x01; 16]);
    cluster.run_ticks(args.ticks);

    for index in 0..args.cluster_size as usize {
        let node = cluster.node(index);
        info!(
            node = index + 1,
            state = ?node.server_state(),
            term = %node.persistent_state().current_term(),
            commit = %node.commit_index(),
            allocations = node.num_allocations(),
            active = node.is_active_mode(),
            "final state"
        );
    }

    let commits = &cluster.node(leader).monitor().commits;
    info!(commits = commits.len(), "allocations committed on the leader");
}
