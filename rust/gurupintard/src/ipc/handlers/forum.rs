use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_required_str, parse_params, reply, store, store_mut, to_json, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, PostDraft};
use serde_json::json;

fn handle_forum_list(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    Ok(json!({ "posts": to_json(&snapshot.forum_posts)? }))
}

fn handle_forum_create_post(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let draft: PostDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, post) = mutations::create_post(store.snapshot(), draft)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({ "postId": post.id, "post": to_json(&post)? }),
        warning,
    ))
}

fn handle_forum_like_post(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let post_id = get_required_str(params, "postId")?;
    let store = store_mut(state)?;
    let next = mutations::like_post(store.snapshot(), &post_id)?;
    let warning = store.commit(next);
    let likes = store
        .snapshot()
        .forum_posts
        .iter()
        .find(|p| p.id == post_id)
        .map(|p| p.likes)
        .unwrap_or(0);
    Ok(with_warning(json!({ "likes": likes }), warning))
}

fn handle_forum_delete_post(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let post_id = get_required_str(params, "postId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_post(store.snapshot(), &post_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

fn handle_forum_add_comment(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let post_id = get_required_str(params, "postId")?;
    let content = get_required_str(params, "content")?;
    let store = store_mut(state)?;
    let (next, comment) = mutations::add_comment(store.snapshot(), &post_id, &content)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "comment": to_json(&comment)? }), warning))
}

fn handle_forum_delete_comment(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let post_id = get_required_str(params, "postId")?;
    let comment_id = get_required_str(params, "commentId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_comment(store.snapshot(), &post_id, &comment_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "forum.list" => handle_forum_list(state, &req.params),
        "forum.createPost" => handle_forum_create_post(state, &req.params),
        "forum.likePost" => handle_forum_like_post(state, &req.params),
        "forum.deletePost" => handle_forum_delete_post(state, &req.params),
        "forum.addComment" => handle_forum_add_comment(state, &req.params),
        "forum.deleteComment" => handle_forum_delete_comment(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
