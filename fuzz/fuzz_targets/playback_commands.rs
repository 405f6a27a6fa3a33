#![no_main]

use libfuzzer_sys::fuzz_target;
use sonora::counts::PlayCounts;
use sonora::model::PlaybackMode;
use sonora::queue::PlaybackQueue;
use sonora::selection::SelectionEngine;

fuzz_target!(|data: &[u8]| {
    let len = data.first().map(|byte| usize::from(*byte % 32)).unwrap_or(0);
    let titles: Vec<String> = (0..len).map(|idx| format!("track_{idx}")).collect();
    let mut engine = SelectionEngine::seeded(data.len() as u64);
    let mut queue = PlaybackQueue::new();
    let mut counts = PlayCounts::default();
    let mut mode = PlaybackMode::Sequential;
    let mut current: Option<String> = None;

    for byte in data.iter().skip(1) {
        let title = format!("track_{}", byte >> 3);
        match byte % 8 {
            0 => mode = mode.next(),
            1 => {
                queue.enqueue(&title);
            }
            2 => {
                queue.enqueue_top(&title);
            }
            3 => {
                queue.remove(&title);
            }
            4 => {
                let mut reordered = queue.snapshot();
                reordered.reverse();
                reordered.push(title);
                queue.replace_all(reordered);
            }
            5 => {
                counts.increment(&title);
            }
            _ => {
                let next =
                    engine.select_next(mode, &titles, current.as_deref(), &mut queue, &counts);
                if next.is_none() {
                    assert!(titles.is_empty());
                }
                current = next;
            }
        }
        let snapshot = queue.snapshot();
        let mut unique = snapshot.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), snapshot.len());
    }
});
