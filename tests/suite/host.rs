//! Timer and process hooks of the tokio host

use weeslack_core::MIN_FREE_FILE_DESCRIPTORS;
use weeslack_types::{PROCESS_ERROR, ProcessOptions};

use crate::common::runtime;

#[tokio::test]
async fn sleep_fires_once() {
    let (rt, mut dispatcher) = runtime();
    let sleeper = rt.clone();
    let handle = rt
        .create_task(async move { sleeper.sleep(20).await })
        .unwrap();

    assert_eq!(dispatcher.run(&rt).await, 1);
    assert_eq!(handle.try_take().unwrap().unwrap(), 1);
    assert!(rt.is_idle());
}

#[tokio::test]
async fn concurrent_sleeps_finish_in_deadline_order() {
    let (rt, mut dispatcher) = runtime();
    let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    for (label, ms) in [("slow", 60), ("fast", 10)] {
        let sleeper = rt.clone();
        let order = order.clone();
        rt.create_final_task(async move {
            sleeper.sleep(ms).await?;
            order.borrow_mut().push(label);
            Ok(())
        })
        .unwrap();
    }

    dispatcher.run(&rt).await;
    assert_eq!(*order.borrow(), vec!["fast", "slow"]);
    assert!(rt.uncaught_errors().is_empty());
}

#[tokio::test]
async fn shell_command_output_is_collected() {
    let (rt, mut dispatcher) = runtime();
    let inner = rt.clone();
    let handle = rt
        .create_task(async move {
            inner
                .hook_process_hashtable("printf hello; printf oops >&2", &ProcessOptions::new(), 5000)
                .await
        })
        .unwrap();

    dispatcher.run(&rt).await;
    let output = handle.try_take().unwrap().unwrap();
    assert_eq!(output.return_code, 0);
    assert_eq!(output.stdout, "hello");
    assert_eq!(output.stderr, "oops");
}

#[tokio::test]
async fn shell_exit_code_is_reported() {
    let (rt, mut dispatcher) = runtime();
    let inner = rt.clone();
    let handle = rt
        .create_task(async move {
            inner
                .hook_process_hashtable("exit 3", &ProcessOptions::new(), 5000)
                .await
        })
        .unwrap();

    dispatcher.run(&rt).await;
    assert_eq!(handle.try_take().unwrap().unwrap().return_code, 3);
}

#[tokio::test]
async fn process_timeout_reports_error_code() {
    let (rt, mut dispatcher) = runtime();
    let inner = rt.clone();
    let handle = rt
        .create_task(async move {
            inner
                .hook_process_hashtable("sleep 5", &ProcessOptions::new(), 50)
                .await
        })
        .unwrap();

    dispatcher.run(&rt).await;
    let output = handle.try_take().unwrap().unwrap();
    assert_eq!(output.return_code, PROCESS_ERROR);
    assert_eq!(output.stderr, "timeout");
}

#[test]
fn test_process_has_descriptors_to_spare() {
    assert!(weeslack_core::available_file_descriptors() >= MIN_FREE_FILE_DESCRIPTORS);
}
