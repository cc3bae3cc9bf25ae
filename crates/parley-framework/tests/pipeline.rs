//! End-to-end turns through the built-in middleware.

use std::sync::Arc;
use std::time::Duration;

use parley_core::{
    Activity, BotAdapter, BotError, MiddlewareSet, activity_types, bot_fn, middleware_fn,
};
use parley_framework::{
    MemoryTranscriptStore, ShowTypingMiddleware, TranscriptLoggerMiddleware, TranscriptStore,
};
use parley_testing::{TestAdapter, TestFlow};

fn echo() -> impl parley_core::Bot {
    bot_fn(|ctx| {
        Box::pin(async move {
            let text = ctx.activity().and_then(|a| a.text.clone()).unwrap_or_default();
            ctx.send_activity(format!("echo: {text}")).await?;
            Ok(())
        })
    })
}

#[tokio::test(start_paused = true)]
async fn test_typing_and_transcript_together() {
    let store = Arc::new(MemoryTranscriptStore::new());
    let adapter = TestAdapter::new()
        .with_middleware(TranscriptLoggerMiddleware::from_shared(store.clone()))
        .with_middleware(
            ShowTypingMiddleware::new(Duration::from_millis(100), Duration::from_secs(1)).unwrap(),
        );

    let bot = bot_fn(|ctx| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            ctx.send_activity("slow answer").await?;
            Ok(())
        })
    });
    adapter.send("question", &bot).await.unwrap();

    let replies = adapter.take_replies();
    assert!(replies[0].is_type(activity_types::TYPING));
    assert_eq!(replies[1].text.as_deref(), Some("slow answer"));

    // Typing goes around the interceptors, so only the answer is logged.
    let logged = store
        .get_transcript_activities("test", "Convo1", None, None)
        .await
        .unwrap()
        .items;
    let texts: Vec<_> = logged.iter().filter_map(|a| a.text.as_deref()).collect();
    assert_eq!(texts, vec!["question", "slow answer"]);
}

#[tokio::test]
async fn test_nested_set_with_interceptors_in_flow() {
    let inner = MiddlewareSet::new().with(middleware_fn(|ctx, next| {
        ctx.on_send_activities(|_ctx, mut activities, next| {
            Box::pin(async move {
                for activity in &mut activities {
                    activity.text = activity.text.take().map(|t| format!("[{t}]"));
                }
                next.run(activities).await
            })
        });
        next.run()
    }));

    let adapter = TestAdapter::new().with_middleware(inner);

    TestFlow::new(adapter, echo())
        .test("a", "[echo: a]")
        .test("b", "[echo: b]")
        .assert_no_reply()
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_turn_error_handler_replies_through_pipeline() {
    let mut adapter = TestAdapter::new();
    adapter.on_turn_error(|ctx, err| {
        Box::pin(async move {
            ctx.send_activity(format!("error: {err}")).await?;
            Ok(())
        })
    });

    let failing = bot_fn(|_ctx| Box::pin(async { Err::<(), _>(BotError::msg("kaboom")) }));
    let ctx = adapter
        .receive_activity(Activity::message("hi"), &failing)
        .await
        .unwrap();

    assert!(ctx.responded());
    assert_eq!(
        adapter.next_reply().unwrap().text.as_deref(),
        Some("error: kaboom")
    );
}
