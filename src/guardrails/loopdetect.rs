//! Consecutive-call loop detection with cooldowns
//!
//! Identical tool calls are identified by a canonical content hash, so the
//! count survives argument maps that iterate in different orders.

use crate::types::LoopDetectionConfig;
use crate::utils::hash::call_hash;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CallRecord {
    hash: String,
    at: Instant,
}

/// Result of a loop check
#[derive(Debug, Clone, Default)]
pub struct LoopCheck {
    pub is_loop: bool,
    pub message: String,
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Loop detector instance. Records and cooldowns are guarded by separate
/// mutexes; the record queue is always locked before the cooldown map.
pub struct LoopDetector {
    config: LoopDetectionConfig,
    records: Mutex<VecDeque<CallRecord>>,
    cooldowns: Mutex<HashMap<String, Instant>>,
}

impl LoopDetector {
    pub fn new(config: LoopDetectionConfig) -> Self {
        Self {
            config,
            records: Mutex::new(VecDeque::new()),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_for_loop(&self, tool: &str, args: &Value) -> LoopCheck {
        self.check_at(tool, args, Instant::now())
    }

    fn check_at(&self, tool: &str, args: &Value, now: Instant) -> LoopCheck {
        if !self.config.enabled {
            return LoopCheck::default();
        }

        let hash = call_hash(tool, args);
        let window = Duration::from_secs(self.config.time_window_seconds);
        let cooldown = Duration::from_secs(self.config.cooldown_seconds);

        let mut records = self.records.lock().expect("loop records lock poisoned");
        let mut cooldowns = self.cooldowns.lock().expect("loop cooldowns lock poisoned");

        // Active cooldown blocks immediately; expired entries purge lazily
        if let Some(&end) = cooldowns.get(&hash) {
            if end > now {
                let remaining = end - now;
                return LoopCheck {
                    is_loop: true,
                    message: format!(
                        "Loop detected: identical call to '{}' is cooling down for another {}s",
                        tool,
                        remaining.as_secs().max(1)
                    ),
                    cooldown_until: Some(cooldown_stamp(remaining)),
                };
            }
            cooldowns.remove(&hash);
        }

        // Drop records that aged out of the window
        while let Some(front) = records.front() {
            if now.duration_since(front.at) > window {
                records.pop_front();
            } else {
                break;
            }
        }

        // Consecutive identical calls at the tail, plus the current one
        let consecutive = records
            .iter()
            .rev()
            .take_while(|r| r.hash == hash)
            .count() as u32
            + 1;

        if consecutive > self.config.max_consecutive_calls {
            cooldowns.insert(hash.clone(), now + cooldown);
            // Restart the count once the cooldown lapses
            records.retain(|r| r.hash != hash);
            return LoopCheck {
                is_loop: true,
                message: format!(
                    "Loop detected: {} consecutive identical calls to '{}' within {}s; cooling down for {}s",
                    consecutive, tool, self.config.time_window_seconds, self.config.cooldown_seconds
                ),
                cooldown_until: Some(cooldown_stamp(cooldown)),
            };
        }

        records.push_back(CallRecord { hash, at: now });
        LoopCheck::default()
    }
}

fn cooldown_stamp(remaining: Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(remaining.as_secs() as i64)
}
