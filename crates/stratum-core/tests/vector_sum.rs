//! Vector-sum task pair across element types and cluster sizes.

use stratum_compute::{launch, Communicator};
use stratum_core::staging::TaskData;
use stratum_core::sum::{sum_parallel, Reducible, VectorSumParallel, VectorSumSequential};
use stratum_core::task::Task;

fn sequential<T: Reducible>(values: &[T]) -> T {
    let data = TaskData::new().with_input(values).with_output::<T>(1);
    let mut task = VectorSumSequential::<T>::new(data);
    assert!(task.validation());
    task.pre_processing().unwrap();
    task.run().unwrap();
    task.post_processing().unwrap();
    task.data().read_output::<T>(0).unwrap()[0]
}

fn parallel<T: Reducible>(workers: usize, values: &[T]) -> T {
    let per_rank = launch(workers, |comm| {
        let data = if comm.rank() == 0 {
            TaskData::new().with_input(values).with_output::<T>(1)
        } else {
            TaskData::default()
        };
        let mut task = VectorSumParallel::<_, T>::new(comm, data);
        assert!(task.validation());
        task.pre_processing().unwrap();
        task.run().unwrap();
        task.post_processing().unwrap();
        (comm.rank() == 0).then(|| task.data().read_output::<T>(0).unwrap()[0])
    })
    .unwrap();
    per_rank.into_iter().flatten().next().unwrap()
}

#[test]
fn integer_sums_match() {
    let values: Vec<i32> = (1..=100).collect();
    assert_eq!(sequential(&values), 5050);
    for workers in 1..=5 {
        assert_eq!(parallel(workers, &values), 5050);
    }
}

#[test]
fn wide_integer_sums_match() {
    let values: Vec<i64> = (0..1000).map(|v| v * 1_000_000).collect();
    let expected = 499_500_000_000;
    assert_eq!(sequential(&values), expected);
    assert_eq!(parallel(3, &values), expected);
}

#[test]
fn float_sums_match() {
    let values: Vec<f64> = (0..64).map(|v| v as f64 * 0.5).collect();
    assert_eq!(sequential(&values), 1008.0);
    assert_eq!(parallel(4, &values), 1008.0);
    let singles: Vec<f32> = vec![0.25; 16];
    assert_eq!(parallel(3, &singles), 4.0);
}

#[test]
fn empty_vector_sums_to_zero() {
    assert_eq!(sequential::<i32>(&[]), 0);
    assert_eq!(parallel::<f64>(3, &[]), 0.0);
}

#[test]
fn fewer_elements_than_workers() {
    assert_eq!(parallel(6, &[7_i32, 8]), 15);
}

#[test]
fn parallel_validation_is_shared() {
    let verdicts = launch(3, |comm| {
        let data = if comm.rank() == 0 {
            TaskData::new().with_input(&[1_i32]).with_output::<i32>(3)
        } else {
            TaskData::default()
        };
        VectorSumParallel::<_, i32>::new(comm, data).validation()
    })
    .unwrap();
    assert_eq!(verdicts, vec![false, false, false]);
}

#[test]
fn bare_reduction_without_tasks() {
    let totals = launch(4, |comm| {
        let values: Vec<i64> = (1..=10).collect();
        sum_parallel(comm, comm.is_rank(0).then_some(values.as_slice())).unwrap()
    })
    .unwrap();
    assert_eq!(totals[0], Some(55));
}
