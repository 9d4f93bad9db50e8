//! End-to-end scenarios and concurrency checks for the pipeline

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};

use crate::config::{BackpressurePolicy, PipelineConfig, RetentionConfig, ValidationConfig};
use crate::{
    HealthStatus, PipelineMetricsCollector, QueryGateway, Reading, StreamProcessor,
    TelematicsPipeline, VehicleStore,
};

fn reading_at(vehicle_id: u32, second: i64, speed: f64, fuel_level: f64, engine_temp: f64) -> Reading {
    let timestamp = Utc.timestamp_opt(1_700_000_000 + second, 0).unwrap();
    Reading::new(vehicle_id, speed, fuel_level, engine_temp, timestamp)
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_temperature_spike_reported() {
        let pipeline = TelematicsPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start().unwrap();

        for (second, temp) in [70.0, 70.0, 70.0].into_iter().enumerate() {
            pipeline.submit(reading_at(42, second as i64, 50.0, 60.0, temp)).await.unwrap();
        }
        let spike = reading_at(42, 3, 50.0, 60.0, 110.0);
        pipeline.submit(spike).await.unwrap();
        pipeline.shutdown().await;

        let health = pipeline.get_health(42).unwrap();
        assert_eq!(health.vehicle_id, 42);
        assert_eq!(health.status, HealthStatus::HighEngineTemp);
        assert_eq!(health.last_updated, spike.timestamp);
    }

    #[tokio::test]
    async fn test_average_speed_over_window() {
        let pipeline = TelematicsPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start().unwrap();

        for (second, speed) in [60.0, 80.0, 100.0].into_iter().enumerate() {
            pipeline.submit(reading_at(7, second as i64, speed, 50.0, 80.0)).await.unwrap();
        }
        pipeline.shutdown().await;

        let summary = pipeline.get_performance(7).unwrap();
        assert_eq!(summary.average_speed, 80.0);
        assert_eq!(summary.sample_count, 3);
    }

    #[tokio::test]
    async fn test_high_temp_outranks_low_fuel() {
        let pipeline = TelematicsPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start().unwrap();
        pipeline.submit(reading_at(5, 0, 40.0, 5.0, 105.0)).await.unwrap();
        pipeline.shutdown().await;

        assert_eq!(pipeline.get_health(5).map(|h| h.status), Some(HealthStatus::HighEngineTemp));
    }

    #[tokio::test]
    async fn test_unknown_vehicle_absent() {
        let pipeline = TelematicsPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start().unwrap();
        pipeline.submit(reading_at(1, 0, 40.0, 50.0, 80.0)).await.unwrap();
        pipeline.shutdown().await;

        for vehicle_id in [0, 2, 999, u32::MAX] {
            assert!(pipeline.get_health(vehicle_id).is_none());
            assert!(pipeline.get_performance(vehicle_id).is_none());
        }
    }

    #[tokio::test]
    async fn test_encoded_epoch_seconds_reading_is_ingested() {
        let pipeline = TelematicsPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start().unwrap();
        pipeline
            .submit_encoded(
                r#"{"vehicle_id": 4242, "speed": 63.2, "fuel_level": 40.1, "engine_temp": 88.0, "timestamp": 1700000000.25}"#,
            )
            .await
            .unwrap();
        pipeline.shutdown().await;

        assert_eq!(pipeline.metrics().decode_errors, 0);
        let health = pipeline.get_health(4242).unwrap();
        assert_eq!(health.status, HealthStatus::Good);
        assert_eq!(
            health.last_updated,
            Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap()
        );
    }

    #[tokio::test]
    async fn test_fifo_eviction_through_pipeline() {
        let pipeline = TelematicsPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start().unwrap();

        for i in 1..=61 {
            pipeline.submit(reading_at(3, i, i as f64, 50.0, 80.0)).await.unwrap();
        }
        pipeline.shutdown().await;

        let snapshot = pipeline.store().snapshot(3).unwrap();
        let speeds: Vec<f64> = snapshot.readings.iter().map(|r| r.speed).collect();
        let expected: Vec<f64> = (2..=61).map(|i| i as f64).collect();
        assert_eq!(speeds, expected);
    }

    #[tokio::test]
    async fn test_blocking_submit_waits_for_consumer() {
        let mut config = PipelineConfig::default();
        config.queue.capacity = 1;
        config.queue.backpressure = BackpressurePolicy::Block;
        let pipeline = TelematicsPipeline::new(config).unwrap();

        let first = reading_at(8, 0, 11.0, 50.0, 80.0);
        pipeline.submit(first).await.unwrap();

        // No consumer yet: the second submit stays pending
        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            pipeline.submit(reading_at(8, 1, 22.0, 50.0, 80.0)),
        )
        .await;
        assert!(pending.is_err());

        pipeline.start().unwrap();
        tokio::time::timeout(Duration::from_secs(1), pipeline.submit(reading_at(8, 2, 33.0, 50.0, 80.0)))
            .await
            .unwrap()
            .unwrap();
        pipeline.shutdown().await;

        let snapshot = pipeline.store().snapshot(8).unwrap();
        assert_eq!(snapshot.readings[0], first);
        let speeds: Vec<f64> = snapshot.readings.iter().map(|r| r.speed).collect();
        assert_eq!(speeds, vec![11.0, 33.0]);
    }

    #[tokio::test]
    async fn test_blocking_submit_with_timeout_reports_full() {
        let mut config = PipelineConfig::default();
        config.queue.capacity = 1;
        config.queue.enqueue_timeout_ms = Some(20);
        let pipeline = TelematicsPipeline::new(config).unwrap();

        pipeline.submit(reading_at(9, 0, 11.0, 50.0, 80.0)).await.unwrap();
        let err = pipeline.submit(reading_at(9, 1, 22.0, 50.0, 80.0)).await.unwrap_err();
        assert!(err.is_backpressure());
        assert_eq!(pipeline.metrics().backpressure_events, 1);
    }

    #[tokio::test]
    async fn test_idle_vehicles_expire() {
        let mut config = PipelineConfig::default();
        config.retention = RetentionConfig { vehicle_ttl_secs: Some(0), sweep_interval_ms: 5 };
        let pipeline = TelematicsPipeline::new(config).unwrap();
        pipeline.start().unwrap();

        pipeline.submit(reading_at(77, 0, 10.0, 50.0, 80.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = pipeline.shutdown().await;

        assert!(pipeline.get_health(77).is_none());
        assert_eq!(report.metrics.vehicles_expired, 1);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    /// One writer thread appending through the processor while several reader
    /// threads query the gateway. Readers must never see an oversized window or a
    /// nonsensical average.
    #[test]
    fn test_snapshot_consistency_under_load() {
        const VEHICLES: u32 = 4;
        const READERS: usize = 6;

        let store = Arc::new(VehicleStore::new(60));
        let metrics = Arc::new(PipelineMetricsCollector::new());
        let gateway = QueryGateway::new(store.clone(), Default::default(), metrics.clone());
        let mut processor = StreamProcessor::new(
            store.clone(),
            ValidationConfig::default(),
            RetentionConfig::default(),
            metrics.clone(),
        );

        let done = Arc::new(AtomicBool::new(false));
        let observations = Arc::new(AtomicU64::new(0));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let gateway = gateway.clone();
                let done = done.clone();
                let observations = observations.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        for vehicle_id in 0..VEHICLES {
                            if let Some(summary) = gateway.get_performance(vehicle_id) {
                                assert!(summary.sample_count >= 1);
                                assert!(summary.sample_count <= 60);
                                assert!(summary.average_speed.is_finite());
                                assert!(summary.average_speed >= 0.0);
                                observations.fetch_add(1, Ordering::Relaxed);
                            }
                            if let Some(health) = gateway.get_health(vehicle_id) {
                                assert_eq!(health.vehicle_id, vehicle_id);
                            }
                        }
                    }
                })
            })
            .collect();

        let writer = thread::spawn(move || {
            for i in 0..20_000u32 {
                let vehicle_id = i % VEHICLES;
                let speed = (i % 120) as f64;
                processor.process(reading_at(vehicle_id, i as i64, speed, 50.0, 80.0).into());
            }
            processor.stats()
        });

        let stats = writer.join().unwrap();
        done.store(true, Ordering::Release);
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(stats.processed, 20_000);
        assert!(observations.load(Ordering::Relaxed) > 0);
        for vehicle_id in 0..VEHICLES {
            assert_eq!(store.snapshot(vehicle_id).unwrap().len(), 60);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_and_queries() {
        let mut config = PipelineConfig::default();
        config.queue.capacity = 64;
        let pipeline = Arc::new(TelematicsPipeline::new(config).unwrap());
        pipeline.start().unwrap();

        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    for i in 0..500u32 {
                        let reading = reading_at(p, i as i64, (i % 100) as f64, 50.0, 80.0);
                        pipeline.submit(reading).await.unwrap();
                    }
                })
            })
            .collect();

        let gateway = pipeline.gateway();
        let deadline = Instant::now() + Duration::from_secs(5);
        let reader = tokio::task::spawn_blocking(move || {
            let mut seen = 0u64;
            while Instant::now() < deadline {
                for vehicle_id in 0..4 {
                    if let Some(summary) = gateway.get_performance(vehicle_id) {
                        assert!(summary.sample_count <= 60);
                        assert!(summary.average_speed.is_finite());
                        seen += 1;
                    }
                }
                if seen > 1_000 {
                    break;
                }
            }
            seen
        });

        for producer in producers {
            producer.await.unwrap();
        }
        let report = pipeline.shutdown().await;
        reader.await.unwrap();

        assert_eq!(report.processor.map(|s| s.processed), Some(2_000));
        for vehicle_id in 0..4 {
            let snapshot = pipeline.store().snapshot(vehicle_id).unwrap();
            assert_eq!(snapshot.len(), 60);
            // Per-producer FIFO: each vehicle's window holds its last 60 readings in order
            let timestamps: Vec<_> = snapshot.readings.iter().map(|r| r.timestamp).collect();
            assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
            assert_eq!(snapshot.latest().map(|r| r.timestamp), Some(reading_at(0, 499, 0.0, 0.0, 0.0).timestamp));
        }
    }
}
