mod burst_dedup_case1;
mod retry_backoff_case1;
mod readiness_timeout_case1;
