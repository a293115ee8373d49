use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn schools_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM schools ORDER BY name")
        .map_err(HandlerErr::db_query)?;
    let schools: Vec<serde_json::Value> = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;
    Ok(json!({ "schools": schools }))
}

fn schools_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    if name.trim().is_empty() {
        return Err(HandlerErr::bad_params("name must not be blank"));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO schools(id, name) VALUES(?, ?)",
        (&id, name.trim()),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(json!({ "schoolId": id }))
}

fn handle_schools_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schools_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_schools_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schools_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schools.list" => Some(handle_schools_list(state, req)),
        "schools.create" => Some(handle_schools_create(state, req)),
        _ => None,
    }
}
