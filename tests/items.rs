mod common;

use std::time::Duration;

use common::{counter_container, fast_settings, Counter, CounterViewModel};
use statehost::testing::{self, HarnessError};
use statehost::{Item, Scope};

#[tokio::test]
async fn items_follow_intent_call_order() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);

    testing::test(view_model, |test| async move {
        test.expect_initial_state().await?;

        test.host().set_and_announce(1, 3)?;
        test.host().set_and_announce(2, 4)?;

        assert_eq!(test.await_item().await?, Item::State(Counter { count: 1 }));
        assert_eq!(test.await_item().await?, Item::SideEffect(3));
        assert_eq!(test.await_item().await?, Item::State(Counter { count: 2 }));
        assert_eq!(test.await_item().await?, Item::SideEffect(4));
        test.expect_no_items().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn skip_items_then_await_side_effect() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);

    testing::test(view_model, |test| async move {
        test.expect_initial_state().await?;
        test.host().set_and_announce(1, 3)?;
        test.host().set_and_announce(2, 4)?;

        test.skip_items(3).await?;
        assert_eq!(test.await_side_effect().await?, 4);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn interleaved_reduces_and_side_effects_keep_order() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let container = counter_container(&scope);

    testing::test(container, |test| async move {
        test.expect_initial_state().await?;
        test.container().intent(|scope| async move {
            for step in 1..=5 {
                scope.reduce(|state| Counter {
                    count: state.count + 1,
                });
                if step % 2 == 0 {
                    scope.post_side_effect(step * 10);
                }
            }
            Ok(())
        })?;

        let mut expected = Vec::new();
        for step in 1..=5 {
            expected.push(Item::State(Counter { count: step }));
            if step % 2 == 0 {
                expected.push(Item::SideEffect(step * 10));
            }
        }
        for item in expected {
            assert_eq!(test.await_item().await?, item);
        }
        test.expect_no_items().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn skip_then_await_returns_next_item() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);

    testing::test(view_model, |test| async move {
        test.host().set_and_announce(7, 70)?;
        test.skip_items(2).await?;
        assert_eq!(test.await_item().await?, Item::SideEffect(70));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn expect_no_items_fails_with_pending_item() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let test = testing::ContainerTest::attach(counter_container(&scope), fast_settings());

    // The initial state is still unconsumed.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = test
        .expect_no_items()
        .await
        .expect_err("initial state is pending");
    assert!(matches!(err, HarnessError::Assertion { .. }));

    test.expect_initial_state().await?;
    test.expect_no_items().await?;
    Ok(())
}

#[tokio::test]
async fn expect_no_items_fails_when_item_arrives_in_window() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let test = testing::ContainerTest::attach(counter_container(&scope), fast_settings());
    test.expect_initial_state().await?;

    test.container().intent(|scope| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        scope.reduce(|_| Counter { count: 9 });
        Ok(())
    })?;

    let err = test
        .expect_no_items_within(Duration::from_millis(500))
        .await
        .expect_err("state arrives inside the window");
    assert!(matches!(err, HarnessError::Assertion { .. }));
    Ok(())
}

#[tokio::test]
async fn await_item_times_out() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let test = testing::ContainerTest::attach(counter_container(&scope), fast_settings());
    test.expect_initial_state().await?;

    let err = test
        .await_item_within(Duration::from_millis(30))
        .await
        .expect_err("nothing was emitted");
    match err {
        HarnessError::Timeout { operation, elapsed } => {
            assert_eq!(operation, "await_item");
            assert!(elapsed >= Duration::from_millis(30));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn skip_items_fails_when_too_few_arrive() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);
    let test = testing::ContainerTest::attach(view_model, fast_settings());

    test.host().set_and_announce(1, 1)?;
    let err = test.skip_items(5).await.expect_err("only three items");
    assert!(matches!(
        err,
        HarnessError::Timeout {
            operation: "skip_items",
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn expect_initial_state_fails_after_prior_intent() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let container = counter_container(&scope);
    container
        .intent(|scope| async move {
            scope.reduce(|_| Counter { count: 5 });
            Ok(())
        })?
        .join()
        .await?;

    let test = testing::ContainerTest::attach(container, fast_settings());
    let err = test
        .expect_initial_state()
        .await
        .expect_err("current state differs from initial");
    assert!(matches!(err, HarnessError::Assertion { .. }));
    Ok(())
}

#[tokio::test]
async fn await_state_rejects_side_effect() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);
    let test = testing::ContainerTest::attach(view_model, fast_settings());
    test.expect_initial_state().await?;

    test.host().set_and_announce(1, 2)?;
    assert_eq!(test.await_state().await?, Counter { count: 1 });
    let err = test.await_state().await.expect_err("next item is a side effect");
    assert!(matches!(err, HarnessError::Assertion { .. }));
    Ok(())
}

#[tokio::test]
async fn unconsumed_items_fail_the_test() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);

    let result = testing::test_with(view_model, fast_settings(), |test| async move {
        test.expect_initial_state().await?;
        test.host().set_and_announce(1, 3)?;
        assert_eq!(test.await_state().await?, Counter { count: 1 });
        test.await_side_effect().await?;
        test.host().set_and_announce(2, 4)?;
        test.await_state().await?;
        // Make sure the trailing side effect was recorded before returning.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    })
    .await;

    let err = result.expect_err("side effect 4 was never consumed");
    match err.downcast_ref::<HarnessError>() {
        Some(HarnessError::UnconsumedItems { count, next }) => {
            assert_eq!(*count, 1);
            assert!(next.contains('4'));
        }
        other => panic!("expected unconsumed items, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn ignored_remaining_items_pass() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let view_model = CounterViewModel::new(&scope);

    testing::test_with(view_model, fast_settings(), |test| async move {
        test.expect_initial_state().await?;
        test.host().set_and_announce(1, 3)?;
        test.await_state().await?;
        test.cancel_and_ignore_remaining_items();
        Ok(())
    })
    .await
}

#[tokio::test]
async fn scope_teardown_ends_waits_promptly() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let test = testing::ContainerTest::attach(counter_container(&scope), fast_settings());
    test.expect_initial_state().await?;

    let canceller = scope.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = test
        .await_item_within(Duration::from_secs(10))
        .await
        .expect_err("container was torn down");
    assert!(matches!(err, HarnessError::ContainerClosed { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn large_burst_from_one_intent_is_recorded_in_full() -> anyhow::Result<()> {
    let scope = Scope::current()?;
    let container = counter_container(&scope);

    testing::test(container, |test| async move {
        test.expect_initial_state().await?;
        test.container().intent(|scope| async move {
            for _ in 0..300 {
                scope.reduce(|state| Counter {
                    count: state.count + 1,
                });
            }
            Ok(())
        })?;

        for count in 1..=300 {
            assert_eq!(test.await_state().await?, Counter { count });
        }
        test.expect_no_items().await?;
        Ok(())
    })
    .await
}
