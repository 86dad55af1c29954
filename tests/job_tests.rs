use jobmill::job::{
    AddNumbersPayload, Job, JobKind, JobResult, JobStatus, LargeArraySumPayload, Payload,
    ResizeImagePayload, ReverseStringPayload,
};

fn add_job(id: &str, x: i64, y: i64) -> Job {
    Job::new(
        id,
        "add_numbers",
        JobKind::AddNumbers,
        1,
        Payload::AddNumbers(AddNumbersPayload { x, y }),
    )
}

fn sum_job(id: &str, array: Vec<i64>) -> Job {
    Job::new(
        id,
        "large_array_sum",
        JobKind::LargeArraySum,
        1,
        Payload::LargeArraySum(LargeArraySumPayload { array }),
    )
}

/// Run all chunks of a job concurrently, one thread per chunk.
fn run_chunked(job: &Job, total: usize) {
    std::thread::scope(|s| {
        for index in 0..total {
            s.spawn(move || job.execute_chunk(index, total));
        }
    });
}

// -------------------------
// Single-threaded kinds
// -------------------------

#[test]
fn test_add_numbers_job() {
    let job = add_job("add1", 3, 4);
    job.execute();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result(), Some(JobResult::AddNumbers { sum: 7 }));
}

#[test]
fn test_add_numbers_job_zero_values() {
    let job = add_job("add2", 0, 0);
    job.execute();

    assert_eq!(job.result(), Some(JobResult::AddNumbers { sum: 0 }));
}

#[test]
fn test_reverse_string_job() {
    let job = Job::new(
        "rev1",
        "reverse_string",
        JobKind::ReverseString,
        1,
        Payload::ReverseString(ReverseStringPayload {
            text: "hello".to_string(),
        }),
    );
    job.execute();

    assert_eq!(
        job.result(),
        Some(JobResult::ReverseString {
            reversed: "olleh".to_string()
        })
    );
}

#[test]
fn test_reverse_string_job_empty() {
    let job = Job::new(
        "rev2",
        "reverse_string",
        JobKind::ReverseString,
        1,
        Payload::ReverseString(ReverseStringPayload {
            text: String::new(),
        }),
    );
    job.execute();

    assert_eq!(
        job.result(),
        Some(JobResult::ReverseString {
            reversed: String::new()
        })
    );
}

#[test]
fn test_resize_image_job_completes() {
    let job = Job::new(
        "img1",
        "resize_image",
        JobKind::ResizeImage,
        1,
        Payload::ResizeImage(ResizeImagePayload {
            url: "http://example.com/image.png".to_string(),
            width: 100,
            height: 200,
        }),
    );
    job.execute();

    // No real resizing is performed; the job must still complete.
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(
        job.result(),
        Some(JobResult::ResizeImage {
            url: "http://example.com/image.png".to_string(),
            width: 100,
            height: 200,
        })
    );
}

// -------------------------
// Array sum: single and chunked
// -------------------------

#[test]
fn test_large_array_sum_job_empty_array() {
    let job = sum_job("arr1", vec![]);
    job.execute();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result(), Some(JobResult::LargeArraySum { sum: 0 }));
}

#[test]
fn test_large_array_sum_job_single_element() {
    let job = sum_job("arr2", vec![42]);
    job.execute();

    assert_eq!(job.result(), Some(JobResult::LargeArraySum { sum: 42 }));
}

#[test]
fn test_large_array_sum_chunked_matches_single() {
    let array: Vec<i64> = (1..=1000).collect();

    let single = sum_job("single", array.clone());
    single.execute();

    let chunked = sum_job("chunked", array);
    chunked.set_thread_demand(8);
    run_chunked(&chunked, 8);

    assert_eq!(single.result(), Some(JobResult::LargeArraySum { sum: 500500 }));
    assert_eq!(chunked.result(), Some(JobResult::LargeArraySum { sum: 500500 }));
}

#[test]
fn test_large_array_sum_more_chunks_than_elements() {
    // More chunks than elements: the extra chunks get an empty range.
    let job = sum_job("arr3", vec![1, 2, 3, 4, 5]);
    job.set_thread_demand(10);
    run_chunked(&job, 10);

    assert_eq!(job.result(), Some(JobResult::LargeArraySum { sum: 15 }));
}

#[test]
fn test_chunk_ranges_cover_array_exactly_once() {
    // Uneven split: 7 elements over 3 chunks.
    let job = sum_job("arr4", vec![1, 10, 100, 1000, 10000, 100000, 1000000]);
    run_chunked(&job, 3);

    assert_eq!(
        job.result(),
        Some(JobResult::LargeArraySum { sum: 1111111 })
    );
}

#[test]
fn test_non_reduction_kind_ignores_chunking() {
    // A chunked job of a non-array kind must still complete exactly once.
    let job = add_job("add3", 5, 7);
    job.set_thread_demand(4);
    run_chunked(&job, 4);

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result(), Some(JobResult::AddNumbers { sum: 12 }));
}

// -------------------------
// Failure and state machine
// -------------------------

#[test]
fn test_payload_mismatch_fails_with_zero_result() {
    let job = Job::new(
        "bad1",
        "add_numbers",
        JobKind::AddNumbers,
        1,
        Payload::ReverseString(ReverseStringPayload {
            text: "notanumber".to_string(),
        }),
    );
    job.execute();

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.result(), Some(JobResult::AddNumbers { sum: 0 }));
    assert!(job.completed_at().is_some());
}

#[test]
fn test_completed_result_is_frozen() {
    let job = sum_job("frozen", vec![1, 2, 3]);
    job.execute();
    assert_eq!(job.result(), Some(JobResult::LargeArraySum { sum: 6 }));

    // Late chunk calls after the terminal transition must not change anything.
    job.execute_chunk(0, 1);
    assert_eq!(job.result(), Some(JobResult::LargeArraySum { sum: 6 }));
    assert_eq!(job.status(), JobStatus::Completed);
}

#[test]
fn test_complete_does_not_overwrite_failed() {
    let job = Job::new(
        "bad2",
        "add_numbers",
        JobKind::AddNumbers,
        1,
        Payload::LargeArraySum(LargeArraySumPayload { array: vec![1] }),
    );
    job.execute();
    assert_eq!(job.status(), JobStatus::Failed);

    job.complete();
    assert_eq!(job.status(), JobStatus::Failed);
}

#[test]
fn test_timestamps_are_monotonic() {
    let job = add_job("ts1", 1, 2);
    job.stamp_started();
    job.mark_running();
    job.execute();

    let started_at = job.started_at().unwrap();
    let completed_at = job.completed_at().unwrap();
    assert!(job.created_at <= started_at);
    assert!(started_at <= completed_at);
}

#[test]
fn test_stamp_started_is_idempotent() {
    let job = add_job("ts2", 1, 2);
    job.stamp_started();
    let first = job.started_at().unwrap();
    job.stamp_started();
    assert_eq!(job.started_at(), Some(first));
}
