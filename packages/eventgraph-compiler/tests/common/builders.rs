//! Producer builders for generated graphs

use eventgraph_compiler::Producer;

/// Linear chain `Step0 -> Step1 -> ...`; step i emits `q{i}` and reads `q{i-1}`
pub fn chain(len: usize) -> Vec<Producer> {
    (0..len)
        .map(|i| {
            let producer = Producer::new(format!("Step{i}")).emits([format!("q{i}")]);
            if i == 0 {
                producer.requires(["raw"])
            } else {
                producer.requires([format!("q{}", i - 1)])
            }
        })
        .collect()
}

/// Apply a permutation (given as sort keys) to a producer list
pub fn permute(producers: Vec<Producer>, keys: &[u32]) -> Vec<Producer> {
    let mut keyed: Vec<(u32, usize, Producer)> = producers
        .into_iter()
        .enumerate()
        .map(|(i, p)| (keys.get(i).copied().unwrap_or(0), i, p))
        .collect();
    keyed.sort_by_key(|(key, i, _)| (*key, *i));
    keyed.into_iter().map(|(_, _, p)| p).collect()
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
