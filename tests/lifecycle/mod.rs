mod concurrent_workers_case1;
mod resync_case1;
