//! Feishu connectors against a local mock server.

use std::sync::Arc;

use mockito::{Matcher, Mock, Server, ServerGuard};
use relwatch_connectors::{
    BitableStore, ConnectorError, FeishuClient, FeishuConfig, FeishuMessenger,
};
use relwatch_core::{
    FieldMap, Mention, Messenger, OutboundMessage, PortError, RecordStore, TableRef,
};
use serde_json::json;

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const RECORDS_PATH: &str = "/open-apis/bitable/v1/apps/bascnApp/tables/tblApps/records";

async fn token_mock(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("POST", TOKEN_PATH)
        .match_body(Matcher::PartialJson(
            json!({ "app_id": "cli_test", "app_secret": "s3cret" }),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":0,"msg":"ok","tenant_access_token":"t-abc","expire":7200}"#)
        .expect(hits)
        .create_async()
        .await
}

fn client(server: &ServerGuard) -> Arc<FeishuClient> {
    Arc::new(
        FeishuClient::new(FeishuConfig::new("cli_test", "s3cret").with_base_url(server.url()))
            .expect("client"),
    )
}

fn table() -> TableRef {
    TableRef::new("bascnApp", "tblApps").with_view("vewAll")
}

#[tokio::test]
async fn resolves_app_token_from_wiki_node() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let node = server
        .mock("GET", "/open-apis/wiki/v2/spaces/get_node")
        .match_query(Matcher::UrlEncoded("token".into(), "wikNode".into()))
        .match_header("authorization", "Bearer t-abc")
        .with_status(200)
        .with_body(
            r#"{"code":0,"msg":"success","data":{"node":{"obj_type":"bitable","obj_token":"bascnApp","title":"Apps"}}}"#,
        )
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let app_token = store.resolve_app_token("wikNode").await.expect("resolved");

    assert_eq!(app_token, "bascnApp");
    node.assert_async().await;
}

#[tokio::test]
async fn rejects_wiki_node_that_is_not_a_bitable() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let _node = server
        .mock("GET", "/open-apis/wiki/v2/spaces/get_node")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code":0,"data":{"node":{"obj_type":"docx","obj_token":"doxcn1"}}}"#)
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let err = store.resolve_app_token("wikNode").await.expect_err("not a bitable");

    assert!(matches!(err, ConnectorError::NotBitable { ref obj_type, .. } if obj_type == "docx"));
}

#[tokio::test]
async fn lists_records_across_pages_with_one_token() {
    let mut server = Server::new_async().await;
    let token = token_mock(&mut server, 1).await;
    let first = server
        .mock("GET", RECORDS_PATH)
        .match_query(Matcher::Exact("page_size=500&view_id=vewAll".into()))
        .with_status(200)
        .with_body(
            json!({
                "code": 0,
                "data": {
                    "items": [
                        { "record_id": "recA", "fields": { "包名": "Atlas", "包状态": "提审中" } },
                        { "record_id": "recEmpty", "fields": {} }
                    ],
                    "has_more": true,
                    "page_token": "pt2",
                    "total": 3
                }
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;
    let second = server
        .mock("GET", RECORDS_PATH)
        .match_query(Matcher::Exact(
            "page_size=500&view_id=vewAll&page_token=pt2".into(),
        ))
        .with_status(200)
        .with_body(
            json!({
                "code": 0,
                "data": {
                    "items": [ { "record_id": "recB", "fields": { "包名": "Beacon" } } ],
                    "has_more": false,
                    "total": 3
                }
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let rows = store.fetch_rows(&table()).await.expect("rows");

    assert_eq!(
        rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["recA", "recB"]
    );
    assert_eq!(rows[0].fields.get("包名"), Some(&json!("Atlas")));

    // the cached token serves the second listing too
    store.fetch_rows(&table()).await.expect("rows again");
    token.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn null_items_page_is_empty() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let _page = server
        .mock("GET", RECORDS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code":0,"msg":"success","data":{"items":null,"has_more":false,"total":0}}"#)
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let rows = store.fetch_rows(&table()).await.expect("rows");

    assert!(rows.is_empty());
}

#[tokio::test]
async fn updates_record_with_put() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let update = server
        .mock("PUT", format!("{RECORDS_PATH}/recA").as_str())
        .match_header("authorization", "Bearer t-abc")
        .match_body(Matcher::Json(
            json!({ "fields": { "包状态": "已发布", "过审时间": 1_760_000_000_000_i64 } }),
        ))
        .with_status(200)
        .with_body(r#"{"code":0,"msg":"success","data":{"record":{"record_id":"recA"}}}"#)
        .create_async()
        .await;

    let mut fields = FieldMap::new();
    fields.insert("包状态".to_string(), json!("已发布"));
    fields.insert("过审时间".to_string(), json!(1_760_000_000_000_i64));

    let store = BitableStore::new(client(&server));
    store
        .write_fields(&table(), "recA", &fields)
        .await
        .expect("updated");
    update.assert_async().await;
}

#[tokio::test]
async fn api_error_on_update_is_rejected() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let _update = server
        .mock("PUT", format!("{RECORDS_PATH}/recA").as_str())
        .with_status(400)
        .with_body(r#"{"code":1254043,"msg":"RecordIdNotFound"}"#)
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let err = store
        .write_fields(&table(), "recA", &FieldMap::new())
        .await
        .expect_err("update fails");

    assert!(matches!(err, PortError::Rejected(ref m) if m.contains("1254043")));
}

#[tokio::test]
async fn token_failure_surfaces_as_api_error() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", TOKEN_PATH)
        .with_status(200)
        .with_body(r#"{"code":10003,"msg":"invalid app_secret"}"#)
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let err = store.list_tables("bascnApp").await.expect_err("bad credentials");

    assert!(matches!(err, ConnectorError::Api { code: 10003, .. }));
}

#[tokio::test]
async fn lists_tables() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let _tables = server
        .mock("GET", "/open-apis/bitable/v1/apps/bascnApp/tables")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"code":0,"data":{"items":[{"table_id":"tblApps","name":"Apps","revision":4}],"has_more":false}}"#,
        )
        .create_async()
        .await;

    let store = BitableStore::new(client(&server));
    let tables = store.list_tables("bascnApp").await.expect("tables");

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table_id, "tblApps");
    assert_eq!(tables[0].name, "Apps");
}

#[tokio::test]
async fn messenger_posts_rich_text_to_chat() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let post = server
        .mock("POST", "/open-apis/im/v1/messages")
        .match_query(Matcher::UrlEncoded(
            "receive_id_type".into(),
            "chat_id".into(),
        ))
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "receive_id": "oc_all", "msg_type": "post" })),
            Matcher::Regex(r#"\\"user_id\\":\\"all\\""#.into()),
            Matcher::Regex(r#""uuid":""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"code":0,"msg":"success","data":{"message_id":"om_1"}}"#)
        .create_async()
        .await;

    let messenger = FeishuMessenger::new(client(&server));
    messenger
        .send_message(&OutboundMessage {
            channel_id: "oc_all".to_string(),
            text: "Atlas 上架 V1.0 passed review and was released".to_string(),
            mention: Mention::All,
        })
        .await
        .expect("sent");
    post.assert_async().await;
}

#[tokio::test]
async fn messenger_reports_bot_not_in_chat() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server, 1).await;
    let _post = server
        .mock("POST", "/open-apis/im/v1/messages")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code":230002,"msg":"Bot/User can NOT be out of the chat."}"#)
        .create_async()
        .await;

    let messenger = FeishuMessenger::new(client(&server));
    let err = messenger
        .send_message(&OutboundMessage {
            channel_id: "oc_elsewhere".to_string(),
            text: "hello".to_string(),
            mention: Mention::None,
        })
        .await
        .expect_err("bot not in chat");

    assert!(matches!(err, PortError::Rejected(ref m) if m.contains("230002") && m.contains("add the app")));
}
