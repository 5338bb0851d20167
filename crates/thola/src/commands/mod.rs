//! Command dispatch: turn parsed arguments into engine requests.

pub mod check;
pub mod config_cmd;
pub mod read;

use thola_config::Config;
use thola_core::device::Transports;
use thola_core::model::{ConnectionData, HttpConnectionData, SnmpConnectionData, V3ConnectionData};
use thola_core::request::types::InterfaceOptions;
use thola_core::{ClassTree, Engine, Request, RequestKind};

use crate::cli::{ConnectionOpts, GlobalOpts, InterfaceFilterArgs};
use crate::error::CliError;
use crate::output;

/// Run one device request and print its response; the result is the
/// process exit code.
pub async fn execute(
    host: &str,
    kind: RequestKind,
    global: &GlobalOpts,
    config: &Config,
) -> Result<i32, CliError> {
    let engine = build_engine(config).await?;

    let mut request = Request::new(host, kind).with_connection(connection_data(&global.connection));
    if let Some(seconds) = global.timeout {
        request = request.with_timeout(seconds);
    }
    if global.ignore_cache {
        request = request.ignoring_cache();
    }

    tracing::debug!(host = %host, kind = request.kind.name(), "dispatching request");
    let response = engine
        .process(request)
        .await
        .map_err(|e| CliError::for_host(e, host))?;

    let format = global.format.unwrap_or_else(|| config.api.format.into());
    output::print_output(&output::render(format, &response)?);
    Ok(response.exit_code())
}

async fn build_engine(config: &Config) -> Result<Engine, CliError> {
    let mut builder = Engine::builder(config.engine_config())
        .cache(config.cache_store()?)
        .transports(Transports::default());
    if let Some(dir) = &config.device.class_dir {
        let sources = thola_core::class::load_dir(dir).await?;
        builder = builder.classes(ClassTree::build(&sources)?);
    }
    Ok(builder.build()?)
}

/// Credentials from the command line; they rank above cache and config.
pub fn connection_data(opts: &ConnectionOpts) -> ConnectionData {
    let v3_data = opts
        .v3_user
        .as_ref()
        .map(|user| V3ConnectionData {
            level: opts.v3_level.clone(),
            user: Some(user.clone()),
            auth_protocol: opts.v3_auth_proto.clone(),
            auth_key: opts.v3_auth_key.clone(),
            priv_protocol: opts.v3_priv_proto.clone(),
            priv_key: opts.v3_priv_key.clone(),
            context_name: opts.v3_context.clone(),
        })
        .into_iter()
        .collect();
    ConnectionData {
        snmp: SnmpConnectionData {
            communities: opts.communities.clone(),
            versions: opts.versions.clone(),
            ports: opts.ports.clone(),
            v3_data,
            discover_parallel: opts.discover_parallel,
            discover_timeout: opts.discover_timeout,
            discover_retries: opts.discover_retries,
        },
        http: HttpConnectionData {
            http_ports: opts.http_ports.clone(),
            https_ports: opts.https_ports.clone(),
            username: opts.http_username.clone(),
            password: opts.http_password.clone(),
        },
    }
}

pub(crate) fn interface_options(filters: InterfaceFilterArgs) -> InterfaceOptions {
    InterfaceOptions {
        if_type_filter: filters.if_type,
        if_name_filter: filters.if_name,
        if_descr_filter: filters.if_descr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_set_only_with_a_user() {
        let none = connection_data(&ConnectionOpts {
            v3_level: Some("authPriv".into()),
            ..ConnectionOpts::default()
        });
        assert!(none.snmp.v3_data.is_empty());

        let one = connection_data(&ConnectionOpts {
            v3_user: Some("monitor".into()),
            v3_level: Some("noAuthNoPriv".into()),
            communities: vec!["private".into()],
            ..ConnectionOpts::default()
        });
        assert_eq!(one.snmp.v3_data.len(), 1);
        assert_eq!(one.snmp.v3_data[0].user.as_deref(), Some("monitor"));
        assert_eq!(one.snmp.communities, ["private"]);
    }
}
