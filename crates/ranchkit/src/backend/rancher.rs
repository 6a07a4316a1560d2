//! Rancher v3 API backend.
//!
//! Requests are blocking and carry the API token as a bearer token. HTTP
//! status errors are not turned into transport errors by the agent; each call
//! checks the status itself so rejections keep their status code and body.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Entity, Member, MemberType, Project, ProjectFields, ProjectQuotas, Quotas};
use log::{debug, error};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use ureq::Body;
use ureq::http::Response;

/// Status codes a call accepts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// 201 only, for POSTs creating an object.
    Created,
    /// Any 2xx.
    Success,
}

impl Expect {
    fn accepts(self, status: u16) -> bool {
        match self {
            Expect::Created => status == 201,
            Expect::Success => (200..300).contains(&status),
        }
    }
}

/// Rancher v3 HTTP backend.
pub struct RancherBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Server URL without trailing slash.
    server_url: String,
    /// Value of the Authorization header.
    auth: String,
}

impl RancherBackend {
    /// Create a backend for a server URL and API token.
    #[must_use]
    pub fn new(server_url: &str, token: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            server_url: server_url.trim_end_matches('/').to_string(),
            auth: format!("Bearer {token}"),
        }
    }

    /// Get the server URL requests are sent to.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn get(&self, operation: &str, path: &str) -> Result<String> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self
            .agent
            .get(&url)
            .header("Authorization", self.auth.as_str())
            .header("Accept", "application/json")
            .call();
        read_response(operation, response, Expect::Success)
    }

    fn post(&self, operation: &str, path: &str, payload: &Value, expect: Expect) -> Result<String> {
        let url = self.url(path);
        debug!("POST {url}: {payload}");
        let response = self
            .agent
            .post(&url)
            .header("Authorization", self.auth.as_str())
            .header("Accept", "application/json")
            .send_json(payload);
        read_response(operation, response, expect)
    }

    fn put(&self, operation: &str, path: &str, payload: &Value) -> Result<String> {
        let url = self.url(path);
        debug!("PUT {url}: {payload}");
        let response = self
            .agent
            .put(&url)
            .header("Authorization", self.auth.as_str())
            .header("Accept", "application/json")
            .send_json(payload);
        read_response(operation, response, Expect::Success)
    }

    fn delete(&self, operation: &str, path: &str) -> Result<String> {
        let url = self.url(path);
        debug!("DELETE {url}");
        let response = self
            .agent
            .delete(&url)
            .header("Authorization", self.auth.as_str())
            .call();
        read_response(operation, response, Expect::Success)
    }

    fn get_project_resource(&self, project_id: &str) -> Result<ProjectResource> {
        let operation = "get project";
        let body = self
            .get(operation, &format!("/v3/projects/{project_id}"))
            .map_err(|e| e.or_not_found("project", project_id))?;
        decode(operation, &body)
    }
}

/// Check the status and read the body of a response.
fn read_response(
    operation: &str,
    response: std::result::Result<Response<Body>, ureq::Error>,
    expect: Expect,
) -> Result<String> {
    let mut response = response.map_err(|e| Error::transport(operation, e))?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::transport(operation, e))?;
    debug!("{operation} response: status={status}, body={body}");

    if !expect.accepts(status) {
        error!("Failed to {operation}: status code={status}, response={body}");
        return Err(Error::Rejected {
            operation: operation.to_string(),
            status,
            body,
        });
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| Error::transport(operation, format!("malformed response: {e}")))
}

// =============================================================================
// Rancher API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct EntityItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindingItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    role_template_id: Option<String>,
    #[serde(default)]
    user_principal_id: Option<String>,
    #[serde(default)]
    group_principal_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotaLimit {
    #[serde(default)]
    limit: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pod_security_policy_template_id: Option<String>,
    #[serde(default)]
    resource_quota: Option<QuotaLimit>,
    #[serde(default)]
    namespace_default_resource_quota: Option<QuotaLimit>,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    #[serde(default)]
    id: Option<String>,
}

impl From<BindingItem> for Member {
    fn from(item: BindingItem) -> Self {
        let user = item.user_principal_id.unwrap_or_default();
        let (member_type, principal_id) = if user.is_empty() {
            (MemberType::Group, item.group_principal_id.unwrap_or_default())
        } else {
            (MemberType::User, user)
        };
        Self {
            id: item.id.unwrap_or_default(),
            member_type,
            principal_id,
            role_template_id: item.role_template_id.unwrap_or_default(),
        }
    }
}

impl ProjectResource {
    fn quotas(&self) -> ProjectQuotas {
        ProjectQuotas {
            project: limits(self.resource_quota.as_ref()),
            namespace: limits(self.namespace_default_resource_quota.as_ref()),
        }
    }

    fn fields(self) -> ProjectFields {
        ProjectFields {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            pod_security_policy_id: self.pod_security_policy_template_id.unwrap_or_default(),
        }
    }
}

/// Quota values are kept verbatim; non-string scalars keep their JSON text.
fn limits(quota: Option<&QuotaLimit>) -> Quotas {
    quota
        .and_then(|q| q.limit.as_ref())
        .map(|limit| {
            limit
                .iter()
                .map(|(resource, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (resource.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Id of a created object, or empty if the body carries none.
///
/// The object already exists once the status was accepted, so an unreadable
/// body is reported as a missing id rather than a transport problem.
fn created_id(body: &str) -> String {
    match serde_json::from_str::<CreatedResource>(body) {
        Ok(created) => created.id.unwrap_or_default(),
        Err(e) => {
            error!("Created object but could not read its id: {e}, response={body}");
            String::new()
        }
    }
}

fn decode_entities(operation: &str, body: &str) -> Result<Vec<Entity>> {
    let collection: Collection<EntityItem> = decode(operation, body)?;
    Ok(collection
        .data
        .into_iter()
        .filter_map(|item| {
            let id = item.id.unwrap_or_default();
            let name = item.name.unwrap_or_default();
            if id.is_empty() || name.is_empty() {
                error!("Either name or id is empty: name='{name}', id='{id}'");
                return None;
            }
            Some(Entity { id, name })
        })
        .collect())
}

fn decode_ids(operation: &str, body: &str) -> Result<Vec<String>> {
    let collection: Collection<EntityItem> = decode(operation, body)?;
    Ok(collection
        .data
        .into_iter()
        .filter_map(|item| item.id.filter(|id| !id.is_empty()))
        .collect())
}

fn decode_bindings(operation: &str, body: &str) -> Result<Vec<Member>> {
    let collection: Collection<BindingItem> = decode(operation, body)?;
    Ok(collection.data.into_iter().map(Member::from).collect())
}

// =============================================================================
// Request payloads
// =============================================================================

fn project_payload(cluster_id: &str, project_id: Option<&str>, project: &Project) -> Value {
    let mut payload = json!({
        "type": "project",
        "name": project.name,
        "clusterId": cluster_id,
        "podSecurityPolicyTemplateId": project.pod_security_policy_id,
        "description": project.description,
        "resourceQuota": { "limit": project.resource_quotas.project },
        "namespaceDefaultResourceQuota": { "limit": project.resource_quotas.namespace },
    });
    if let Some(id) = project_id {
        payload["id"] = Value::String(id.to_string());
    }
    payload
}

fn binding_payload(project_id: &str, member: &Member) -> Value {
    let (user_principal, group_principal) = match member.member_type {
        MemberType::User => (member.principal_id.as_str(), ""),
        MemberType::Group => ("", member.principal_id.as_str()),
    };
    json!({
        "type": "projectRoleTemplateBinding",
        "subjectKind": member.member_type.as_str(),
        "userId": "",
        "projectRoleTemplateId": "",
        "projectId": project_id,
        "groupPrincipalId": group_principal,
        "userPrincipalId": user_principal,
        "roleTemplateId": member.role_template_id,
    })
}

impl Backend for RancherBackend {
    fn list_clusters(&self) -> Result<Vec<Entity>> {
        let operation = "list clusters";
        let body = self.get(operation, "/v3/clusters/")?;
        decode_entities(operation, &body)
    }

    fn list_namespaces(&self, cluster_id: &str) -> Result<Vec<String>> {
        let operation = "list namespaces";
        let body = self
            .get(operation, &format!("/v3/cluster/{cluster_id}/namespaces"))
            .map_err(|e| e.or_not_found("cluster", cluster_id))?;
        decode_ids(operation, &body)
    }

    fn list_projects(&self, cluster_id: &str) -> Result<Vec<Entity>> {
        let operation = "list projects";
        let body = self
            .get(operation, &format!("/v3/cluster/{cluster_id}/projects"))
            .map_err(|e| e.or_not_found("cluster", cluster_id))?;
        decode_entities(operation, &body)
    }

    fn list_project_namespaces(&self, cluster_id: &str, project_id: &str) -> Result<Vec<String>> {
        let operation = "list project namespaces";
        let body = self
            .get(
                operation,
                &format!("/v3/cluster/{cluster_id}/namespaces?projectId={project_id}"),
            )
            .map_err(|e| e.or_not_found("cluster", cluster_id))?;
        decode_ids(operation, &body)
    }

    fn list_project_bindings(&self, project_id: &str) -> Result<Vec<Member>> {
        let operation = "list project members";
        let body = self
            .get(
                operation,
                &format!("/v3/projects/{project_id}/projectroletemplatebindings"),
            )
            .map_err(|e| e.or_not_found("project", project_id))?;
        decode_bindings(operation, &body)
    }

    fn get_project_quotas(&self, project_id: &str) -> Result<ProjectQuotas> {
        Ok(self.get_project_resource(project_id)?.quotas())
    }

    fn get_project_fields(&self, project_id: &str) -> Result<ProjectFields> {
        Ok(self.get_project_resource(project_id)?.fields())
    }

    fn create_project(&self, cluster_id: &str, project: &Project) -> Result<String> {
        let operation = "create project";
        debug!(
            "Creating project '{}' in cluster '{cluster_id}', server-url='{}'",
            project.name, self.server_url
        );
        let payload = project_payload(cluster_id, None, project);
        let body = self.post(operation, "/v3/project?_replace=true", &payload, Expect::Created)?;
        Ok(created_id(&body))
    }

    fn replace_project(&self, cluster_id: &str, project_id: &str, project: &Project) -> Result<()> {
        let operation = "update project";
        let payload = project_payload(cluster_id, Some(project_id), project);
        self.put(
            operation,
            &format!("/v3/projects/{project_id}?_replace=true"),
            &payload,
        )
        .map_err(|e| e.or_not_found("project", project_id))?;
        Ok(())
    }

    fn set_project_security_policy(&self, project_id: &str, policy_id: &str) -> Result<()> {
        let payload = json!({ "podSecurityPolicyTemplateId": policy_id });
        self.post(
            "set project PSP",
            &format!("/v3/projects/{project_id}?action=setpodsecuritypolicytemplate"),
            &payload,
            Expect::Success,
        )?;
        Ok(())
    }

    fn bind_member(&self, project_id: &str, member: &Member) -> Result<()> {
        let payload = binding_payload(project_id, member);
        self.post(
            "add project member",
            "/v3/projectroletemplatebinding",
            &payload,
            Expect::Created,
        )?;
        Ok(())
    }

    fn unbind_member(&self, binding_id: &str) -> Result<()> {
        debug!("Deleting member {binding_id}");
        self.delete(
            "delete project member",
            &format!("/v3/projectRoleTemplateBindings/{binding_id}"),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url_trailing_slash() {
        let backend = RancherBackend::new("https://rancher.example.org/", "token-abc");
        assert_eq!(backend.server_url(), "https://rancher.example.org");
        assert_eq!(
            backend.url("/v3/clusters/"),
            "https://rancher.example.org/v3/clusters/"
        );
        assert_eq!(backend.auth, "Bearer token-abc");
    }

    #[test]
    fn test_expect_accepts() {
        assert!(Expect::Created.accepts(201));
        assert!(!Expect::Created.accepts(200));
        assert!(Expect::Success.accepts(200));
        assert!(Expect::Success.accepts(204));
        assert!(!Expect::Success.accepts(404));
        assert!(!Expect::Success.accepts(500));
    }

    fn response(status: u16, body: &str) -> std::result::Result<Response<Body>, ureq::Error> {
        Ok(Response::builder()
            .status(status)
            .body(Body::builder().data(body.to_string()))
            .unwrap())
    }

    #[test]
    fn test_read_response_accepts_success() {
        let body = read_response("get project", response(200, "{\"id\":\"c-1:p-1\"}"), Expect::Success)
            .unwrap();
        assert_eq!(body, "{\"id\":\"c-1:p-1\"}");
    }

    #[test]
    fn test_read_response_rejection_keeps_status_and_body() {
        let err = read_response(
            "add project member",
            response(422, "{\"code\":\"InvalidBodyContent\"}"),
            Expect::Created,
        )
        .unwrap_err();
        match err {
            Error::Rejected {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "add project member");
                assert_eq!(status, 422);
                assert_eq!(body, "{\"code\":\"InvalidBodyContent\"}");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_read_response_created_requires_201() {
        let err = read_response("create project", response(200, "{}"), Expect::Created).unwrap_err();
        assert_eq!(err.status(), Some(200));
        assert!(read_response("create project", response(201, "{}"), Expect::Created).is_ok());
    }

    #[test]
    fn test_read_response_404_on_project_read_is_not_found() {
        let err = read_response("get project", response(404, "{}"), Expect::Success)
            .map_err(|e| e.or_not_found("project", "c-1:p-9"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound { kind: "project", ref id } if id == "c-1:p-9"
        ));
    }

    #[test]
    fn test_read_response_transport_failure() {
        let err = read_response(
            "list clusters",
            Err(ureq::Error::ConnectionFailed),
            Expect::Success,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    /// Serve one canned HTTP response on a local port; returns the base URL.
    fn serve_once(reply: &'static str) -> String {
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim().is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut body = vec![0; length];
            reader.read_exact(&mut body).unwrap();
            reader.get_mut().write_all(reply.as_bytes()).unwrap();
        });
        url
    }

    #[test]
    fn test_create_with_empty_body_is_missing_identity() {
        let url = serve_once("HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let backend = RancherBackend::new(&url, "token-abc");
        let reconciler = crate::reconcile::Reconciler::new(&backend, "c-1");

        let err = reconciler.create(&Project::new("demo")).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity { ref name } if name == "demo"));
        assert_eq!(err.category(), crate::error::ErrorCategory::Identity);
    }

    #[test]
    fn test_created_id_unreadable_body_is_empty() {
        assert_eq!(created_id("{\"id\":\"c-1:p-7\",\"type\":\"project\"}"), "c-1:p-7");
        assert_eq!(created_id(""), "");
        assert_eq!(created_id("<html>"), "");
        assert_eq!(created_id("{\"id\":5}"), "");
        assert_eq!(created_id("{}"), "");
    }

    #[test]
    fn test_decode_entities_skips_incomplete() {
        let body = r#"{"data":[
            {"id":"c-1","name":"local"},
            {"id":"c-2","name":null},
            {"name":"orphan"},
            {"id":"c-3","name":"prod","state":"active"}
        ]}"#;
        let entities = decode_entities("list clusters", body).unwrap();
        assert_eq!(
            entities,
            vec![Entity::new("c-1", "local"), Entity::new("c-3", "prod")]
        );
    }

    #[test]
    fn test_decode_entities_missing_data() {
        assert!(decode_entities("list clusters", "{}").unwrap().is_empty());
    }

    #[test]
    fn test_decode_malformed_is_transport_error() {
        let err = decode_entities("list clusters", "<html>").unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("list clusters"));
    }

    #[test]
    fn test_decode_ids() {
        let body = r#"{"data":[{"id":"default"},{"id":"kube-system"},{"id":""}]}"#;
        assert_eq!(
            decode_ids("list namespaces", body).unwrap(),
            vec!["default", "kube-system"]
        );
    }

    #[test]
    fn test_decode_bindings_member_type() {
        let body = r#"{"data":[
            {"id":"p-1:b-1","roleTemplateId":"project-owner",
             "userPrincipalId":"local://u-1","groupPrincipalId":null},
            {"id":"p-1:b-2","roleTemplateId":"project-member",
             "userPrincipalId":"","groupPrincipalId":"openldap_group://cn=dev,dc=example"}
        ]}"#;
        let members = decode_bindings("list project members", body).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].member_type, MemberType::User);
        assert_eq!(members[0].principal_id, "local://u-1");
        assert_eq!(members[0].id, "p-1:b-1");
        assert_eq!(members[1].member_type, MemberType::Group);
        assert_eq!(members[1].principal_id, "openldap_group://cn=dev,dc=example");
        assert_eq!(members[1].role_template_id, "project-member");
    }

    #[test]
    fn test_decode_project_resource() {
        let body = r#"{
            "id":"c-1:p-1","name":"demo","description":"Demo project",
            "podSecurityPolicyTemplateId":"restricted",
            "resourceQuota":{"limit":{"limitsCpu":"2500m","pods":10}},
            "namespaceDefaultResourceQuota":null
        }"#;
        let resource: ProjectResource = decode("get project", body).unwrap();
        let quotas = resource.quotas();
        assert_eq!(quotas.project["limitsCpu"], "2500m");
        assert_eq!(quotas.project["pods"], "10");
        assert!(quotas.namespace.is_empty());

        let fields = resource.fields();
        assert_eq!(fields.name, "demo");
        assert_eq!(fields.description, "Demo project");
        assert_eq!(fields.pod_security_policy_id, "restricted");
    }

    #[test]
    fn test_project_payload() {
        let mut project = Project::new("demo");
        project.pod_security_policy_id = "tcloud".to_string();
        project
            .resource_quotas
            .namespace
            .insert("limitsMemory".to_string(), "1Gi".to_string());

        let create = project_payload("c-1", None, &project);
        assert_eq!(create["type"], "project");
        assert_eq!(create["clusterId"], "c-1");
        assert_eq!(create["podSecurityPolicyTemplateId"], "tcloud");
        assert_eq!(create["namespaceDefaultResourceQuota"]["limit"]["limitsMemory"], "1Gi");
        assert!(create.get("id").is_none());

        let update = project_payload("c-1", Some("c-1:p-1"), &project);
        assert_eq!(update["id"], "c-1:p-1");
    }

    #[test]
    fn test_binding_payload() {
        let group = Member::group("openldap_group://cn=dev,dc=example", "project-member");
        let payload = binding_payload("c-1:p-1", &group);
        assert_eq!(payload["subjectKind"], "Group");
        assert_eq!(payload["groupPrincipalId"], "openldap_group://cn=dev,dc=example");
        assert_eq!(payload["userPrincipalId"], "");
        assert_eq!(payload["projectId"], "c-1:p-1");

        let user = Member::user("local://u-1", "project-owner");
        let payload = binding_payload("c-1:p-1", &user);
        assert_eq!(payload["subjectKind"], "User");
        assert_eq!(payload["userPrincipalId"], "local://u-1");
        assert_eq!(payload["roleTemplateId"], "project-owner");
    }
}
