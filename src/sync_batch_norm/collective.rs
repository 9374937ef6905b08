//! Cross-device all-reduce used to synchronize batch statistics
//!
//! Devices are modelled as threads of one process. Each collective is
//! identified by a shared name; a call blocks until every one of the
//! `num_devices` participants has contributed, then all of them receive the
//! element-wise sum.

use crate::{
    error::{DeepLabError, Result},
    tracing_config::spans,
};
use ndarray::Array1;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};

/// A sum all-reduce across devices that share a collective name.
///
/// Every participant of one round must pass the same `shared_name`,
/// `num_devices` and input length, and a distinct `device_id` in
/// `0..num_devices`.
pub trait AllReduce: Send + Sync {
    fn all_reduce_sum(
        &self,
        shared_name: &str,
        num_devices: usize,
        device_id: usize,
        input: &Array1<f32>,
    ) -> Result<Array1<f32>>;
}

#[derive(Debug)]
struct Round {
    num_devices: usize,
    contributed: HashSet<usize>,
    sum: Option<Array1<f32>>,
    result: Option<Array1<f32>>,
    departed: usize,
}

impl Round {
    fn new(num_devices: usize) -> Self {
        Self {
            num_devices,
            contributed: HashSet::with_capacity(num_devices),
            sum: None,
            result: None,
            departed: 0,
        }
    }

    fn check_joinable(
        &self,
        shared_name: &str,
        num_devices: usize,
        device_id: usize,
        len: usize,
    ) -> Result<()> {
        if self.num_devices != num_devices {
            return Err(DeepLabError::collective(format!(
                "Collective '{}' expects {} devices but device {} reported {}",
                shared_name, self.num_devices, device_id, num_devices
            )));
        }
        if self.contributed.contains(&device_id) {
            return Err(DeepLabError::collective(format!(
                "Device {} contributed twice to collective '{}'",
                device_id, shared_name
            )));
        }
        if let Some(sum) = &self.sum {
            if sum.len() != len {
                return Err(DeepLabError::collective(format!(
                    "Collective '{}' expects inputs of length {} but device {} sent {}",
                    shared_name,
                    sum.len(),
                    device_id,
                    len
                )));
            }
        }
        Ok(())
    }
}

/// Rendezvous-based all-reduce for devices running as threads of one process.
///
/// Rounds with the same shared name run back to back: a new round cannot start
/// until every participant of the previous one has collected its result.
#[derive(Debug, Default)]
pub struct InProcessAllReduce {
    rounds: Mutex<HashMap<String, Round>>,
    changed: Condvar,
}

impl InProcessAllReduce {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Round>>> {
        self.rounds
            .lock()
            .map_err(|_| DeepLabError::collective("Collective state lock poisoned"))
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, HashMap<String, Round>>,
    ) -> Result<MutexGuard<'a, HashMap<String, Round>>> {
        self.changed
            .wait(guard)
            .map_err(|_| DeepLabError::collective("Collective state lock poisoned"))
    }

    /// Number of collectives with at least one participant still inside
    pub fn active_rounds(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

impl AllReduce for InProcessAllReduce {
    fn all_reduce_sum(
        &self,
        shared_name: &str,
        num_devices: usize,
        device_id: usize,
        input: &Array1<f32>,
    ) -> Result<Array1<f32>> {
        if num_devices == 0 {
            return Err(DeepLabError::collective(format!(
                "Collective '{}' requires at least one device",
                shared_name
            )));
        }
        if device_id >= num_devices {
            return Err(DeepLabError::collective(format!(
                "Device id {} out of range for collective '{}' with {} devices",
                device_id, shared_name, num_devices
            )));
        }

        let _span = spans::all_reduce(shared_name, device_id, num_devices).entered();

        let mut rounds = self.lock()?;

        // Previous round under this name still handing out results
        while rounds
            .get(shared_name)
            .is_some_and(|round| round.result.is_some())
        {
            rounds = self.wait(rounds)?;
        }

        if let Some(round) = rounds.get(shared_name) {
            round.check_joinable(shared_name, num_devices, device_id, input.len())?;
        }

        let round = rounds
            .entry(shared_name.to_string())
            .or_insert_with(|| Round::new(num_devices));
        round.contributed.insert(device_id);
        match round.sum.as_mut() {
            Some(sum) => *sum += input,
            None => round.sum = Some(input.clone()),
        }

        if round.contributed.len() == round.num_devices {
            round.result = round.sum.take();
            tracing::trace!(shared_name = %shared_name, "all participants arrived");
            self.changed.notify_all();
        }

        loop {
            let ready = rounds
                .get(shared_name)
                .map(|round| round.result.is_some())
                .ok_or_else(|| {
                    DeepLabError::internal(format!(
                        "Collective '{}' vanished before completion",
                        shared_name
                    ))
                })?;
            if ready {
                break;
            }
            rounds = self.wait(rounds)?;
        }

        let round = rounds.get_mut(shared_name).ok_or_else(|| {
            DeepLabError::internal(format!("Collective '{}' vanished", shared_name))
        })?;
        let output = round.result.clone().ok_or_else(|| {
            DeepLabError::internal(format!("Collective '{}' has no result", shared_name))
        })?;
        round.departed += 1;
        if round.departed == round.num_devices {
            rounds.remove(shared_name);
            self.changed.notify_all();
        }

        Ok(output)
    }
}
