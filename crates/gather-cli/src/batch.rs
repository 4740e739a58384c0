use std::time::Duration;

use gather_core::config::WorkerConfig;
use gather_core::models::{Task, TaskError, WorkerError};
use gather_core::orchestration::{TaskContext, Worker};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Getter,
    Sender,
}

/// A batch of simulated steps read from JSON.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Batch {
    pub mode: StepKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub default_argument: Value,
    pub tasks: Vec<StepSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub name: String,
    /// Overrides the batch mode for this step.
    #[serde(default)]
    pub kind: Option<StepKind>,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub argument: Option<Value>,
}

impl Batch {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            label: self.label.clone(),
            invoke_timeout_ms: self.timeout_ms,
        }
    }

    pub fn build_worker(&self) -> Result<Worker<Value, Value>, WorkerError> {
        let mut worker = Worker::with_config(self.worker_config());
        for step in &self.tasks {
            let kind = step.kind.unwrap_or(self.mode);
            worker.register(step.name.clone(), step.task(kind), step.argument.clone())?;
        }
        Ok(worker)
    }
}

impl StepSpec {
    fn task(&self, kind: StepKind) -> Task<Value, Value> {
        let delay = Duration::from_millis(self.delay_ms);
        let fail = self.fail.clone();
        let value = self.value.clone();

        match kind {
            StepKind::Getter => Task::getter(move |context: TaskContext, argument: Value| {
                let fail = fail.clone();
                let value = value.clone();
                async move {
                    pause(&context, delay).await?;
                    match fail {
                        Some(message) => Err(message.into()),
                        None => Ok(value.unwrap_or(argument)),
                    }
                }
            }),
            StepKind::Sender => Task::sender(move |context: TaskContext, _: Value| {
                let fail = fail.clone();
                async move {
                    pause(&context, delay).await?;
                    match fail {
                        Some(message) => Err(message.into()),
                        None => Ok(()),
                    }
                }
            }),
        }
    }
}

async fn pause(context: &TaskContext, delay: Duration) -> Result<(), TaskError> {
    tokio::select! {
        _ = context.cancelled() => Err("step interrupted by cancellation".into()),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Runs the batch and returns the gathered values as a JSON object.
pub async fn run(batch: &Batch) -> Result<Value, WorkerError> {
    let worker = batch.build_worker()?;
    tracing::info!(
        label = worker.config().label_or_default(),
        tasks = worker.len(),
        mode = ?worker.mode(),
        "running batch"
    );

    let results = worker
        .invoke(&TaskContext::new(), batch.default_argument.clone())
        .await?;
    Ok(Value::Object(results.into_iter().collect::<Map<String, Value>>()))
}

#[cfg(test)]
mod tests {
    use gather_core::models::WorkerErrorKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_documented_batch_format() {
        let batch = Batch::from_json(
            r#"{
                "mode": "getter",
                "timeout_ms": 1000,
                "default_argument": "shared",
                "tasks": [
                    { "name": "a", "delay_ms": 10, "value": 1 },
                    { "name": "b", "delay_ms": 5, "fail": "boom", "argument": "override" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(batch.mode, StepKind::Getter);
        assert_eq!(batch.tasks.len(), 2);
        assert_eq!(batch.tasks[1].fail.as_deref(), Some("boom"));
        assert_eq!(
            batch.worker_config().timeout(),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = Batch::from_json(r#"{"mode": "getter", "tasks": [], "priority": 1}"#);
        assert!(error.is_err());
    }

    #[tokio::test]
    async fn getter_batch_gathers_values_and_arguments() {
        let batch = Batch::from_json(
            r#"{
                "mode": "getter",
                "default_argument": "shared",
                "tasks": [
                    { "name": "a", "value": 1 },
                    { "name": "b", "delay_ms": 5 },
                    { "name": "c", "argument": "own" }
                ]
            }"#,
        )
        .unwrap();

        let output = run(&batch).await.unwrap();
        assert_eq!(output, json!({ "a": 1, "b": "shared", "c": "own" }));
    }

    #[tokio::test]
    async fn sender_batch_reports_false_per_task() {
        let batch = Batch::from_json(
            r#"{ "mode": "sender", "tasks": [ { "name": "email" }, { "name": "sms" } ] }"#,
        )
        .unwrap();

        let output = run(&batch).await.unwrap();
        assert_eq!(output, json!({ "email": false, "sms": false }));
    }

    #[tokio::test]
    async fn failing_step_fails_the_batch() {
        let batch = Batch::from_json(
            r#"{
                "mode": "getter",
                "tasks": [ { "name": "x" }, { "name": "y", "fail": "boom" }, { "name": "z" } ]
            }"#,
        )
        .unwrap();

        let error = run(&batch).await.unwrap_err();
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn mixed_kinds_are_rejected_when_building() {
        let batch = Batch::from_json(
            r#"{
                "mode": "getter",
                "tasks": [ { "name": "a" }, { "name": "notify", "kind": "sender" } ]
            }"#,
        )
        .unwrap();

        let error = batch.build_worker().err().unwrap();
        assert_eq!(error.kind(), WorkerErrorKind::ModeMismatch);
    }

    #[tokio::test]
    async fn batch_timeout_cancels_slow_steps() {
        let batch = Batch::from_json(
            r#"{
                "mode": "sender",
                "timeout_ms": 30,
                "tasks": [ { "name": "slow", "delay_ms": 5000 } ]
            }"#,
        )
        .unwrap();

        let error = run(&batch).await.unwrap_err();
        assert_eq!(error.kind(), WorkerErrorKind::Cancelled);
    }

    #[test]
    fn worker_carries_the_batch_label() {
        let labelled = Batch::from_json(r#"{ "mode": "getter", "label": "nightly", "tasks": [] }"#)
            .unwrap();
        let worker = labelled.build_worker().unwrap();
        assert_eq!(worker.config().label_or_default(), "nightly");

        let unlabelled = Batch::from_json(r#"{ "mode": "getter", "tasks": [] }"#).unwrap();
        let worker = unlabelled.build_worker().unwrap();
        assert_eq!(worker.config().label_or_default(), "worker");
    }
}
