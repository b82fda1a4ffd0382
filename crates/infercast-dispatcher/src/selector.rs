use infercast_common::{Endpoint, InfercastError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin cursor over the live endpoint set.
///
/// The cursor is a single atomic counter, so `next` can be called from any
/// number of workers without a lock: each call claims a distinct ticket and
/// maps it onto the endpoint list. Over N calls every endpoint is returned
/// either ⌊N/M⌋ or ⌈N/M⌉ times.
///
/// The selector never runs dry; it is dropped at the end of a batch.
#[derive(Debug)]
pub struct EndpointSelector {
    endpoints: Vec<Endpoint>,
    cursor: AtomicUsize,
}

impl EndpointSelector {
    /// Wraps a live endpoint set.
    ///
    /// # Returns
    /// - `Ok(selector)` - At least one endpoint
    /// - `Err(InfercastError::NoLiveEndpoints)` - Empty set
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(InfercastError::NoLiveEndpoints);
        }

        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the next endpoint in round-robin order.
    pub fn next(&self) -> Endpoint {
        let ticket = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.endpoints[ticket % self.endpoints.len()]
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn endpoints(n: u8) -> Vec<Endpoint> {
        (1..=n)
            .map(|i| Endpoint::parse(&format!("10.0.0.{}", i), 8088).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_set_rejected() {
        let err = EndpointSelector::new(vec![]).unwrap_err();
        assert!(matches!(err, InfercastError::NoLiveEndpoints));
    }

    #[test]
    fn test_round_robin_wraps() {
        let live = endpoints(3);
        let selector = EndpointSelector::new(live.clone()).unwrap();

        assert_eq!(selector.next(), live[0]);
        assert_eq!(selector.next(), live[1]);
        assert_eq!(selector.next(), live[2]);
        assert_eq!(selector.next(), live[0]);
        // wraps around
    }

    #[test]
    fn test_single_endpoint() {
        let live = endpoints(1);
        let selector = EndpointSelector::new(live.clone()).unwrap();
        assert_eq!(selector.next(), live[0]);
        assert_eq!(selector.next(), live[0]);
        assert_eq!(selector.len(), 1);
    }

    #[test]
    fn test_concurrent_fairness() {
        let live = endpoints(3);
        let selector = Arc::new(EndpointSelector::new(live.clone()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = Arc::clone(&selector);
                std::thread::spawn(move || {
                    (0..1000).map(|_| selector.next()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<Endpoint, usize> = HashMap::new();
        for handle in handles {
            for endpoint in handle.join().unwrap() {
                *counts.entry(endpoint).or_default() += 1;
            }
        }

        // 8000 selections over 3 endpoints: 2666 or 2667 each
        assert_eq!(counts.len(), 3);
        for endpoint in &live {
            let n = counts[endpoint];
            assert!(n == 2666 || n == 2667, "{} selected {} times", endpoint, n);
        }
    }
}
