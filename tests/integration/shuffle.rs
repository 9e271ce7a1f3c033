use crate::*;

use netsort_core::RecordLayout;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_node_scenario() {
    let cluster = TestCluster::new(2, SMALL).await.unwrap();

    // All four records start on node 0; node 1 has nothing.
    let shard0 = vec![
        0xff, 4, 4, 4, //
        0x10, 1, 1, 1, //
        0x80, 3, 3, 3, //
        0x7f, 2, 2, 2,
    ];
    let results = cluster.run(&[shard0, Vec::new()]).await.unwrap();

    let (report0, out0) = &results[0];
    let (report1, out1) = &results[1];
    assert_eq!(out0, &vec![0x10, 1, 1, 1, 0x7f, 2, 2, 2]);
    assert_eq!(out1, &vec![0x80, 3, 3, 3, 0xff, 4, 4, 4]);

    assert_eq!(report0.send.records_read, 4);
    assert_eq!(report0.send.kept, 2);
    assert_eq!(report0.send.sent.get(&1), Some(&2));
    assert_eq!(report1.received, 2);
    assert_eq!(report0.written + report1.written, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_records_cross_in_both_directions() {
    let cluster = TestCluster::new(2, SMALL).await.unwrap();
    let shard0 = vec![0x90, 0, 0, 1, 0x05, 0, 0, 2];
    let shard1 = vec![0x01, 0, 0, 3, 0xa0, 0, 0, 4];
    let results = cluster.run(&[shard0, shard1]).await.unwrap();

    assert_eq!(results[0].1, vec![0x01, 0, 0, 3, 0x05, 0, 0, 2]);
    assert_eq!(results[1].1, vec![0x90, 0, 0, 1, 0xa0, 0, 0, 4]);
    assert_eq!(results[0].0.received, 1);
    assert_eq!(results[1].0.received, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_four_nodes_conserve_partition_and_sort() {
    let layout = RecordLayout::default();
    let nodes = 4;
    let cluster = TestCluster::new(nodes, layout).await.unwrap();
    let shards: Vec<Vec<u8>> = (0..nodes)
        .map(|i| generate(500, layout, 0x5eed + i as u64))
        .collect();
    let results = cluster.run(&shards).await.unwrap();

    for (node, (_, output)) in results.iter().enumerate() {
        assert_owned_and_sorted(node, output, layout, nodes);
    }

    let input = multiset(
        shards
            .iter()
            .flat_map(|s| records(s, layout))
            .map(<[u8]>::to_vec),
    );
    let output = multiset(
        results
            .iter()
            .flat_map(|(_, o)| records(o, layout))
            .map(<[u8]>::to_vec),
    );
    assert_eq!(input.len(), 2000);
    assert_eq!(input, output, "records were lost or duplicated");

    // Bucket concatenation in id order is globally sorted.
    let global: Vec<u8> = results.iter().flat_map(|(_, o)| o.clone()).collect();
    assert_owned_and_sorted_globally(&global, layout);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_eight_nodes_small_records() {
    let nodes = 8;
    let cluster = TestCluster::new(nodes, SMALL).await.unwrap();
    let shards: Vec<Vec<u8>> = (0..nodes).map(|i| generate(200, SMALL, 7 + i as u64)).collect();
    let results = cluster.run(&shards).await.unwrap();

    let mut total = 0;
    for (node, (report, output)) in results.iter().enumerate() {
        assert_owned_and_sorted(node, output, SMALL, nodes);
        assert_eq!(report.written as usize * SMALL.record_len, output.len());
        total += report.written;
    }
    assert_eq!(total, 1600);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_runs_are_byte_identical() {
    let layout = RecordLayout::default();
    let shards: Vec<Vec<u8>> = (0..2).map(|i| generate(300, layout, 99 + i)).collect();

    let first = TestCluster::new(2, layout).await.unwrap().run(&shards).await.unwrap();
    let second = TestCluster::new(2, layout).await.unwrap().run(&shards).await.unwrap();

    for node in 0..2 {
        assert_eq!(first[node].1, second[node].1, "node {node} output differs between runs");
    }
}

#[tokio::test]
async fn test_single_node_sorts_locally() {
    let cluster = TestCluster::new(1, SMALL).await.unwrap();
    let shard = vec![0x30, 0, 0, 0, 0x10, 0, 0, 0, 0xf0, 0, 0, 0, 0x20, 0, 0, 0];
    let results = cluster.run(&[shard]).await.unwrap();

    let (report, output) = &results[0];
    assert_eq!(
        output,
        &vec![0x10, 0, 0, 0, 0x20, 0, 0, 0, 0x30, 0, 0, 0, 0xf0, 0, 0, 0]
    );
    assert!(report.send.sent.is_empty());
    assert_eq!(report.received, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_trailing_partial_record_is_dropped() {
    let cluster = TestCluster::new(2, SMALL).await.unwrap();
    let shard0 = vec![0x10, 1, 1, 1, 0x90, 2, 2, 2, 0xee, 0xee];
    let results = cluster.run(&[shard0, Vec::new()]).await.unwrap();

    assert_eq!(results[0].1, vec![0x10, 1, 1, 1]);
    assert_eq!(results[1].1, vec![0x90, 2, 2, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_empty_inputs_produce_empty_outputs() {
    let cluster = TestCluster::new(4, SMALL).await.unwrap();
    let results = cluster.run(&vec![Vec::new(); 4]).await.unwrap();
    for (report, output) in results {
        assert!(output.is_empty());
        assert_eq!(report.written, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tiny_queue_still_completes() {
    let mut cluster = TestCluster::new(2, SMALL).await.unwrap();
    cluster.config.shuffle.queue_capacity = 1;
    let shards: Vec<Vec<u8>> = (0..2).map(|i| generate(1000, SMALL, 42 + i)).collect();
    let results = cluster.run(&shards).await.unwrap();

    let total: u64 = results.iter().map(|(r, _)| r.written).sum();
    assert_eq!(total, 2000);
}

fn assert_owned_and_sorted_globally(all: &[u8], layout: RecordLayout) {
    let recs = records(all, layout);
    for pair in recs.windows(2) {
        assert!(pair[0][..layout.key_len] <= pair[1][..layout.key_len]);
    }
}
