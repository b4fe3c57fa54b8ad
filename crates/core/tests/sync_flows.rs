//! End-to-end flows across the session, feed, graph and interaction services
//! running on the in-memory backends.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use maplit::hashset;
use socialsync_common::Config;
use socialsync_core::{
    AuthorSnapshot, ClientContext, IdentityProvider, MemoryIdentityProvider, PostDraft, ProfileUpdate,
    RecordingToaster, RegisterInput, Route, SessionState, SessionWatcher, UserRef,
};
use socialsync_db::MemoryStore;
use socialsync_db::entities::Profile;

struct App {
    context: ClientContext,
    store: MemoryStore,
    identity: MemoryIdentityProvider,
    toaster: RecordingToaster,
}

fn app() -> App {
    let toaster = RecordingToaster::new();
    let (context, store, identity) =
        ClientContext::in_memory(Config::default(), Arc::new(toaster.clone())).unwrap();
    App {
        context,
        store,
        identity,
        toaster,
    }
}

async fn seed_profile(app: &App, uid: &str, name: &str) -> AuthorSnapshot {
    app.context
        .profiles()
        .save(&Profile::new(uid, name))
        .await
        .unwrap();
    AuthorSnapshot {
        uid: uid.to_string(),
        name: name.to_string(),
        avatar: None,
        email: None,
    }
}

fn draft(text: &str) -> PostDraft {
    PostDraft {
        text: text.to_string(),
        ..Default::default()
    }
}

async fn signed_in(watcher: &SessionWatcher) -> SessionState {
    watcher
        .state()
        .wait_for(SessionState::is_signed_in)
        .await
        .unwrap()
        .clone()
}

#[tokio::test]
async fn followed_authors_posts_reach_personalized_feed() {
    let app = app();
    let ann = seed_profile(&app, "u1", "Ann").await;
    let bob = seed_profile(&app, "u2", "Bob").await;
    seed_profile(&app, "u3", "Cyd").await;

    let feed = app.context.feed();
    let graph = app.context.graph();
    let global = feed.global();
    let personal = feed.personalized("u1");

    graph
        .follow("u1", &Profile::new("u2", "Bob").as_follow_entry())
        .await
        .unwrap();
    let hello = feed.submit_post(&bob, draft("hello")).await.unwrap();
    let own = feed.submit_post(&ann, draft("mine")).await.unwrap();
    let other = feed
        .submit_post(
            &AuthorSnapshot {
                uid: "u3".to_string(),
                name: "Cyd".to_string(),
                avatar: None,
                email: None,
            },
            draft("unrelated"),
        )
        .await
        .unwrap();

    let global_ids: Vec<_> = global.posts().into_iter().map(|p| p.id).collect();
    assert_eq!(global_ids, [other.id, own.id.clone(), hello.id.clone()]);

    let personal_ids: Vec<_> = personal.posts().into_iter().map(|p| p.id).collect();
    assert_eq!(personal_ids, [own.id, hello.id]);

    global.close();
    personal.close();
    assert_eq!(app.store.active_subscriptions(), 0);
}

#[tokio::test]
async fn author_delete_removes_post_from_every_feed() {
    let app = app();
    let ann = seed_profile(&app, "u1", "Ann").await;
    seed_profile(&app, "u2", "Bob").await;
    app.context
        .graph()
        .follow("u2", &Profile::new("u1", "Ann").as_follow_entry())
        .await
        .unwrap();

    let feed = app.context.feed();
    let global = feed.global();
    let bobs_feed = feed.personalized("u2");
    let post = feed.submit_post(&ann, draft("soon gone")).await.unwrap();
    assert_eq!(bobs_feed.posts().len(), 1);

    feed.delete_post("u2", &post.id).await.unwrap();
    assert_eq!(global.posts().len(), 1);
    assert_eq!(bobs_feed.posts().len(), 1);

    feed.delete_post("u1", &post.id).await.unwrap();
    assert!(global.posts().is_empty());
    assert!(bobs_feed.posts().is_empty());

    global.close();
    bobs_feed.close();
}

#[tokio::test]
async fn posts_keep_author_snapshot_after_profile_edit() {
    let app = app();
    let ann = seed_profile(&app, "u1", "Ann").await;
    let feed = app.context.feed();
    let view = feed.author_feed("u1");

    feed.submit_post(&ann, draft("before rename")).await.unwrap();
    app.context
        .graph()
        .update_profile(
            "u1",
            ProfileUpdate {
                name: Some("Annabelle".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(view.posts()[0].name, "Ann");
    let summary = app.context.graph().profile_summary("u1").await.unwrap();
    assert_eq!(summary.profile.name, "Annabelle");
    assert_eq!(summary.post_count, 1);
    view.close();
}

#[tokio::test]
async fn like_and_comment_components_release_on_unmount() {
    let app = app();
    let ann = seed_profile(&app, "u1", "Ann").await;
    let post = app
        .context
        .feed()
        .submit_post(&ann, draft("comment here"))
        .await
        .unwrap();

    let interactions = app.context.interactions();
    let likes = interactions.mount(&post.id, "u2").await;
    let comments = interactions.mount_comments(
        &post.id,
        AuthorSnapshot {
            uid: "u2".to_string(),
            name: "Bob".to_string(),
            avatar: None,
            email: None,
        },
    );
    assert_eq!(app.store.active_subscriptions(), 2);

    likes.toggle_like().await.unwrap();
    likes.toggle_like().await.unwrap();
    assert_eq!(likes.like_count(), 0);

    let older = comments.submit("first").await.unwrap();
    let newer = comments.submit("second").await.unwrap();
    assert!(newer.created_at > older.created_at);
    let ordered: Vec<_> = comments.comments().into_iter().map(|c| c.text).collect();
    assert_eq!(ordered, ["second", "first"]);

    likes.unmount();
    comments.unmount();
    assert_eq!(app.store.active_subscriptions(), 0);
}

#[tokio::test]
async fn signup_compose_and_sign_out() {
    let app = app();
    let watcher = app.context.start_session();
    let actions = app.context.session_actions();

    let avatar = app
        .context
        .uploader()
        .upload(
            socialsync_core::MediaKind::ProfileImage,
            "ann.png",
            Bytes::from_static(b"avatar"),
        )
        .await
        .unwrap();
    actions
        .register(&RegisterInput {
            name: "Annie".to_string(),
            email: "ann@example.com".to_string(),
            password: "secret1".to_string(),
            bio: Some("hi".to_string()),
            image: Some(avatar.clone()),
        })
        .await
        .unwrap();

    let state = signed_in(&watcher).await;
    let session = state.session().unwrap();
    assert_eq!(app.context.navigator.current(), Route::Home);
    assert_eq!(
        session.profile.as_ref().and_then(|p| p.bio.as_deref()),
        Some("hi")
    );

    let author = AuthorSnapshot::from_session(session);
    assert_eq!(author.avatar.as_deref(), Some(avatar.as_str()));

    let mut composer = app.context.composer();
    composer.set_text("party");
    composer
        .attach_image("party.png", Bytes::from_static(b"img"), 640, 480)
        .await
        .unwrap();
    let overlay = composer.overlay_mut();
    overlay.click(50, 60);
    overlay.select(UserRef {
        uid: "u9".to_string(),
        name: "Bob".to_string(),
    });
    overlay.confirm();
    let post = composer.submit(&author).await.unwrap();
    assert_eq!(post.tags, ["Bob"]);
    assert_eq!(post.name, "Annie");

    actions.sign_out().await.unwrap();
    watcher
        .state()
        .wait_for(|s| *s == SessionState::SignedOut)
        .await
        .unwrap();
    assert_eq!(app.context.navigator.current(), Route::Login);
    assert!(app.identity.current().is_none());

    watcher.stop().await;
    assert_eq!(app.store.active_subscriptions(), 0);
    assert!(app.toaster.errors().is_empty());
}

#[tokio::test]
async fn read_outage_latches_feed_error() {
    let app = app();
    let ann = seed_profile(&app, "u1", "Ann").await;
    let feed = app.context.feed();
    let view = feed.personalized("u1");

    app.store.fail_reads(Some("unavailable"));
    feed.submit_post(&ann, draft("during outage")).await.unwrap();
    assert!(view.has_error());

    app.store.fail_reads(None);
    feed.submit_post(&ann, draft("after")).await.unwrap();
    assert_eq!(view.posts().len(), 2);
    assert!(view.has_error());
    assert!(!app.toaster.errors().is_empty());
    view.close();
}

#[tokio::test]
async fn directory_lists_everyone_with_follow_status() {
    let app = app();
    for (uid, name) in [("u1", "Ann"), ("u2", "Bob"), ("u3", "Cyd")] {
        seed_profile(&app, uid, name).await;
    }
    let graph = app.context.graph();
    let status = graph.watch_follow_status("u1", "u3");
    graph
        .toggle_follow("u1", &Profile::new("u3", "Cyd").as_follow_entry())
        .await
        .unwrap();

    let users = graph.list_users().await.unwrap();
    let names: HashSet<_> = users.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, hashset! {"Ann", "Bob", "Cyd"});
    assert!(status.is_following());

    let ann = users.iter().find(|p| p.uid == "u1").unwrap();
    assert!(ann.follows("u3"));
    assert!(!ann.follows("u2"));
    status.close();
}
