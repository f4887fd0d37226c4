//! The connection state machine: handshake, authentication, prepare,
//! execute, scripts, transactions and teardown.
//!
//! A connection is owned by one executor at a time; every exchange is
//! strictly request/response with an explicit `Sync` or `Flush` boundary,
//! so messages correlate by position alone. Anything that breaks that
//! ordering marks the connection dirty and it must be discarded.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use edgeline_protocol::client_message::{Cardinality, ClientHandshake, ClientMessage};
use edgeline_protocol::client_message::{DescribeAspect, DescribeStatement, Execute};
use edgeline_protocol::client_message::{ExecuteScript, IoFormat, OptimisticExecute, Prepare};
use edgeline_protocol::client_message::{SaslInitialResponse, SaslResponse};
use edgeline_protocol::codec::{Codec, CodecRegistry};
use edgeline_protocol::errors::EncodeError;
use edgeline_protocol::features::ProtocolVersion;
use edgeline_protocol::server_message::{Authentication, CommandDataDescription};
use edgeline_protocol::server_message::{ServerMessage, TransactionState};
use edgeline_protocol::value::Value;

use crate::builder::Config;
use crate::cache::{PreparedQuery, QueryCache};
use crate::errors::{AuthenticationError, CardinalityViolationError, ClientConnectionError};
use crate::errors::{ClientEncodingError, ClientInconsistentError, Error, ErrorKind};
use crate::errors::{InterfaceError, InvalidArgumentError, PasswordRequired};
use crate::errors::{ProtocolEncodingError, ProtocolOutOfOrderError};
use crate::reader;
use crate::scram::ScramClient;
use crate::server_params::ServerParams;

/// A single connection to the server, generic over the (externally
/// established) transport
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    in_buf: BytesMut,
    out_buf: BytesMut,
    proto: ProtocolVersion,
    transaction_state: TransactionState,
    server_key_data: Option<[u8; 32]>,
    server_params: ServerParams,
    codecs: Arc<CodecRegistry>,
    queries: Arc<QueryCache>,
    call_timeout: std::time::Duration,
    dirty: bool,
}

/// Rows produced by a single query, kept as raw bytes with the codec
/// needed to decode them
#[derive(Debug)]
pub struct QueryResult {
    pub status: Bytes,
    pub cardinality: Cardinality,
    pub rows: Vec<Bytes>,
    pub output_codec: Arc<dyn Codec>,
}

/// Outcome of an `execute_script` exchange
#[derive(Debug)]
pub struct ScriptResult {
    pub status: Bytes,
    pub rows: Vec<Bytes>,
}

impl QueryResult {
    pub fn decode(&self) -> Result<Vec<Value>, Error> {
        self.rows
            .iter()
            .map(|chunk| {
                self.output_codec
                    .decode_bytes(chunk)
                    .map_err(ProtocolEncodingError::with_source)
            })
            .collect()
    }
}

fn out_of_order(msg: ServerMessage) -> Error {
    ProtocolOutOfOrderError::with_message(format!("unsolicited message {:?}", msg))
}

fn encode_arguments(codec: &Arc<dyn Codec>, arguments: &Value) -> Result<Bytes, Error> {
    let mut buf = BytesMut::with_capacity(8);
    codec.encode(&mut buf, arguments).map_err(|e| match e {
        e @ (EncodeError::InvalidValue { .. } | EncodeError::ObjectAsArgument { .. }) => {
            InvalidArgumentError::with_source(e)
        }
        e => ClientEncodingError::with_source(e),
    })?;
    Ok(buf.freeze())
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Drive handshake and authentication on a fresh transport, returning
    /// an idle connection
    pub async fn handshake(
        stream: S,
        config: &Config,
        codecs: Arc<CodecRegistry>,
        queries: Arc<QueryCache>,
    ) -> Result<Connection<S>, Error> {
        let mut conn = Connection {
            stream,
            in_buf: BytesMut::with_capacity(8192),
            out_buf: BytesMut::with_capacity(8192),
            proto: ProtocolVersion::current(),
            transaction_state: TransactionState::NotInTransaction,
            server_key_data: None,
            server_params: ServerParams::default(),
            codecs,
            queries,
            call_timeout: config.call_timeout(),
            dirty: false,
        };
        let (major_ver, minor_ver) = conn.proto.version_tuple();
        conn.send(&[ClientMessage::ClientHandshake(ClientHandshake {
            major_ver,
            minor_ver,
            params: vec![
                ("user".into(), config.user().into()),
                ("database".into(), config.database().into()),
            ],
            extensions: vec![],
        })])
        .await?;

        let mut msg = conn.message().await?;
        if let ServerMessage::ServerHandshake(hs) = msg {
            let offered = ProtocolVersion::new(hs.major_ver, hs.minor_ver);
            if !offered.is_supported() {
                return Err(ClientConnectionError::with_message(format!(
                    "server speaks protocol {}.{}, which this client does not support",
                    hs.major_ver, hs.minor_ver,
                )));
            }
            conn.proto = offered;
            // the server has the final say; the handshake is not re-sent
            msg = conn.message().await?;
        }
        match msg {
            ServerMessage::Authentication(Authentication::Ok) => {}
            ServerMessage::Authentication(Authentication::Sasl { methods }) => {
                if !methods.iter().any(|m| m == "SCRAM-SHA-256") {
                    return Err(AuthenticationError::with_message(format!(
                        "no supported authentication methods: {:?}",
                        methods,
                    )));
                }
                match config.password() {
                    Some(password) => {
                        let user = config.user().to_owned();
                        conn.scram_authenticate(&user, password).await?;
                    }
                    None => {
                        return Err(PasswordRequired::with_message(
                            "password required but not specified",
                        ));
                    }
                }
            }
            ServerMessage::ErrorResponse(err) => {
                return Err(Error::from(err).context("error authenticating"));
            }
            msg => return Err(out_of_order(msg)),
        }

        conn.wait_ready().await?;
        Ok(conn)
    }

    async fn scram_authenticate(&mut self, user: &str, password: &str) -> Result<(), Error> {
        let scram = ScramClient::new(user, password, None);
        let (scram, first) = scram.client_first();
        self.send(&[ClientMessage::AuthenticationSaslInitialResponse(
            SaslInitialResponse {
                method: "SCRAM-SHA-256".into(),
                data: Bytes::from(first.into_bytes()),
            },
        )])
        .await?;
        let data = match self.message().await? {
            ServerMessage::Authentication(Authentication::SaslContinue { data }) => data,
            ServerMessage::ErrorResponse(err) => return Err(err.into()),
            msg => return Err(out_of_order(msg)),
        };
        let server_first = std::str::from_utf8(&data).map_err(|_| {
            AuthenticationError::with_message("invalid utf-8 in SCRAM-SHA-256 auth")
        })?;
        let scram = scram.handle_server_first(server_first)?;
        let (scram, client_final) = scram.client_final();
        self.send(&[ClientMessage::AuthenticationSaslResponse(SaslResponse {
            data: Bytes::from(client_final.into_bytes()),
        })])
        .await?;
        let data = match self.message().await? {
            ServerMessage::Authentication(Authentication::SaslFinal { data }) => data,
            ServerMessage::ErrorResponse(err) => return Err(err.into()),
            msg => return Err(out_of_order(msg)),
        };
        let server_final = std::str::from_utf8(&data).map_err(|_| {
            AuthenticationError::with_message("invalid utf-8 in SCRAM-SHA-256 auth")
        })?;
        scram.handle_server_final(server_final)?;
        loop {
            match self.message().await? {
                ServerMessage::Authentication(Authentication::Ok) => return Ok(()),
                msg => log::warn!("unsolicited message {:?}", msg),
            }
        }
    }

    /// Prepare a statement, populating codecs and the query cache, and
    /// leave the connection idle
    pub async fn prepare(
        &mut self,
        statement: &str,
        cardinality: Cardinality,
        io_format: IoFormat,
    ) -> Result<Arc<PreparedQuery>, Error> {
        if let Some(query) = self.queries.get(statement, cardinality, io_format) {
            return Ok(query);
        }
        self.start()?;
        let query = self
            .prepare_statement(statement, cardinality, io_format)
            .await?;
        self.sync_ready().await?;
        self.end_clean();
        Ok(query)
    }

    /// Run a statement and collect its rows.
    ///
    /// A cached statement takes the optimistic single-round-trip path;
    /// otherwise the statement is prepared first in the same sync window.
    pub async fn query(
        &mut self,
        statement: &str,
        arguments: &Value,
        cardinality: Cardinality,
        io_format: IoFormat,
    ) -> Result<QueryResult, Error> {
        if let Some(query) = self.queries.get(statement, cardinality, io_format) {
            return self
                .query_optimistic(statement, arguments, cardinality, io_format, query)
                .await;
        }
        self.start()?;
        let query = self
            .prepare_statement(statement, cardinality, io_format)
            .await?;
        let arguments = match encode_arguments(&query.input_codec, arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                // nothing was executed; return to idle and report
                self.sync_ready().await?;
                self.end_clean();
                return Err(e);
            }
        };
        self.send(&[
            ClientMessage::Execute(Execute {
                headers: Default::default(),
                statement_name: Bytes::new(),
                arguments,
            }),
            ClientMessage::Sync,
        ])
        .await?;
        self.collect_rows(&query).await
    }

    async fn query_optimistic(
        &mut self,
        statement: &str,
        arguments: &Value,
        cardinality: Cardinality,
        io_format: IoFormat,
        query: Arc<PreparedQuery>,
    ) -> Result<QueryResult, Error> {
        // encoding failures happen before any wire traffic
        let encoded = encode_arguments(&query.input_codec, arguments)?;
        self.start()?;
        self.send(&[
            ClientMessage::OptimisticExecute(OptimisticExecute {
                headers: Default::default(),
                io_format,
                expected_cardinality: cardinality,
                command_text: statement.into(),
                input_typedesc_id: query.input_typedesc_id,
                output_typedesc_id: query.output_typedesc_id,
                arguments: encoded,
            }),
            ClientMessage::Sync,
        ])
        .await?;

        let mut rows = Vec::new();
        loop {
            match self.message().await? {
                ServerMessage::Data(data) => rows.extend(data.data),
                ServerMessage::CommandComplete(complete) => {
                    self.wait_ready().await?;
                    self.end_clean();
                    return Ok(QueryResult {
                        status: complete.status_data,
                        cardinality: query.cardinality,
                        rows,
                        output_codec: query.output_codec.clone(),
                    });
                }
                ServerMessage::CommandDataDescription(desc) => {
                    // our descriptors went stale: refresh the codecs,
                    // re-encode and fall back to a plain execute
                    check_cardinality(cardinality, desc.result_cardinality)?;
                    let refreshed = self.materialise(&desc)?;
                    self.queries
                        .add(statement, cardinality, io_format, refreshed.clone());
                    self.wait_ready().await?;
                    let arguments =
                        match encode_arguments(&refreshed.input_codec, arguments) {
                            Ok(arguments) => arguments,
                            Err(e) => {
                                self.end_clean();
                                return Err(e);
                            }
                        };
                    self.send(&[
                        ClientMessage::Execute(Execute {
                            headers: Default::default(),
                            statement_name: Bytes::new(),
                            arguments,
                        }),
                        ClientMessage::Sync,
                    ])
                    .await?;
                    return self.collect_rows(&refreshed).await;
                }
                ServerMessage::ErrorResponse(err) => {
                    self.queries.clear(statement, cardinality, io_format);
                    self.wait_ready().await?;
                    self.end_clean();
                    return Err(err.into());
                }
                msg => return Err(out_of_order(msg)),
            }
        }
    }

    /// Run an opaque script (the transaction control statements come
    /// through here)
    pub async fn execute_script(&mut self, script: &str) -> Result<ScriptResult, Error> {
        self.start()?;
        self.send(&[ClientMessage::ExecuteScript(ExecuteScript {
            headers: Default::default(),
            script_text: script.into(),
        })])
        .await?;
        let mut rows = Vec::new();
        loop {
            match self.message().await? {
                ServerMessage::Data(data) => rows.extend(data.data),
                ServerMessage::CommandComplete(complete) => {
                    self.wait_ready().await?;
                    self.end_clean();
                    return Ok(ScriptResult {
                        status: complete.status_data,
                        rows,
                    });
                }
                ServerMessage::ErrorResponse(err) => {
                    // script errors come with a ready_for_command, so the
                    // connection survives
                    self.wait_ready().await?;
                    self.end_clean();
                    return Err(err.into());
                }
                msg => return Err(out_of_order(msg)),
            }
        }
    }

    /// Start a transaction; a no-op if one is already open
    pub async fn begin(&mut self, statement: &str) -> Result<TransactionState, Error> {
        use TransactionState::*;
        match self.transaction_state {
            InTransaction | InFailedTransaction => Ok(self.transaction_state),
            NotInTransaction => {
                self.execute_script(statement).await?;
                Ok(self.transaction_state)
            }
        }
    }

    /// Commit the open transaction; a no-op outside a healthy transaction,
    /// reporting the current (possibly failed) state
    pub async fn commit(&mut self, statement: &str) -> Result<TransactionState, Error> {
        use TransactionState::*;
        match self.transaction_state {
            NotInTransaction | InFailedTransaction => Ok(self.transaction_state),
            InTransaction => {
                self.execute_script(statement).await?;
                Ok(self.transaction_state)
            }
        }
    }

    /// Roll back the open transaction; a no-op when there is none
    pub async fn rollback(&mut self, statement: &str) -> Result<TransactionState, Error> {
        use TransactionState::*;
        match self.transaction_state {
            NotInTransaction => Ok(self.transaction_state),
            InTransaction | InFailedTransaction => {
                self.execute_script(statement).await?;
                Ok(self.transaction_state)
            }
        }
    }

    /// Close the connection; replies after `terminate` are ignored
    pub async fn terminate(mut self) -> Result<(), Error> {
        self.send(&[ClientMessage::Terminate]).await.ok();
        Ok(())
    }

    // Cursor hooks exist only for interface conformance with the pooling
    // layer; the binary protocol has no cursors.
    pub fn declare_cursor(&mut self) -> Result<(), Error> {
        self.dirty = true;
        Err(InterfaceError::with_message(
            "cursors are not supported by this driver",
        ))
    }
    pub fn fetch_cursor(&mut self) -> Result<(), Error> {
        self.dirty = true;
        Err(InterfaceError::with_message(
            "cursors are not supported by this driver",
        ))
    }
    pub fn deallocate_cursor(&mut self) -> Result<(), Error> {
        self.dirty = true;
        Err(InterfaceError::with_message(
            "cursors are not supported by this driver",
        ))
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction_state
    }
    /// Opaque blob sent by the server after authentication
    pub fn server_key_data(&self) -> Option<&[u8; 32]> {
        self.server_key_data.as_ref()
    }
    pub fn server_params(&self) -> &ServerParams {
        &self.server_params
    }
    pub fn protocol(&self) -> &ProtocolVersion {
        &self.proto
    }
    /// Whether the connection can accept another request
    pub fn is_consistent(&self) -> bool {
        !self.dirty
    }

    async fn prepare_statement(
        &mut self,
        statement: &str,
        cardinality: Cardinality,
        io_format: IoFormat,
    ) -> Result<Arc<PreparedQuery>, Error> {
        self.send(&[
            ClientMessage::Prepare(Prepare {
                headers: Default::default(),
                io_format,
                expected_cardinality: cardinality,
                statement_name: Bytes::new(),
                command_text: statement.into(),
            }),
            ClientMessage::Flush,
        ])
        .await?;
        let prepared = loop {
            match self.message().await? {
                ServerMessage::PrepareComplete(prepared) => break prepared,
                ServerMessage::ErrorResponse(err) => {
                    self.sync_ready().await?;
                    self.end_clean();
                    return Err(err.into());
                }
                msg => return Err(out_of_order(msg)),
            }
        };
        check_cardinality(cardinality, prepared.cardinality)?;

        let cached = (
            self.codecs.get(&prepared.input_typedesc_id),
            self.codecs.get(&prepared.output_typedesc_id),
        );
        let query = if let (Some(input_codec), Some(output_codec)) = cached {
            Arc::new(PreparedQuery {
                cardinality: prepared.cardinality,
                input_typedesc_id: prepared.input_typedesc_id,
                output_typedesc_id: prepared.output_typedesc_id,
                input_codec,
                output_codec,
            })
        } else {
            self.send(&[
                ClientMessage::DescribeStatement(DescribeStatement {
                    headers: Default::default(),
                    aspect: DescribeAspect::DataDescription,
                    statement_name: Bytes::new(),
                }),
                ClientMessage::Flush,
            ])
            .await?;
            let desc = loop {
                match self.message().await? {
                    ServerMessage::CommandDataDescription(desc) => break desc,
                    ServerMessage::ErrorResponse(err) => {
                        self.sync_ready().await?;
                        self.end_clean();
                        return Err(err.into());
                    }
                    msg => return Err(out_of_order(msg)),
                }
            };
            check_cardinality(cardinality, desc.result_cardinality)?;
            self.materialise(&desc)?
        };
        self.queries
            .add(statement, cardinality, io_format, query.clone());
        Ok(query)
    }

    fn materialise(
        &self,
        desc: &CommandDataDescription,
    ) -> Result<Arc<PreparedQuery>, Error> {
        let input = desc.input().map_err(ProtocolEncodingError::with_source)?;
        let output = desc.output().map_err(ProtocolEncodingError::with_source)?;
        let input_codec = input
            .build_codec(&self.codecs)
            .map_err(ProtocolEncodingError::with_source)?;
        let output_codec = output
            .build_codec(&self.codecs)
            .map_err(ProtocolEncodingError::with_source)?;
        Ok(Arc::new(PreparedQuery {
            cardinality: desc.result_cardinality,
            input_typedesc_id: desc.input.id,
            output_typedesc_id: desc.output.id,
            input_codec,
            output_codec,
        }))
    }

    async fn collect_rows(&mut self, query: &PreparedQuery) -> Result<QueryResult, Error> {
        let mut rows = Vec::new();
        loop {
            match self.message().await? {
                ServerMessage::Data(data) => rows.extend(data.data),
                ServerMessage::CommandComplete(complete) => {
                    self.wait_ready().await?;
                    self.end_clean();
                    return Ok(QueryResult {
                        status: complete.status_data,
                        cardinality: query.cardinality,
                        rows,
                        output_codec: query.output_codec.clone(),
                    });
                }
                ServerMessage::ErrorResponse(err) => {
                    self.wait_ready().await?;
                    self.end_clean();
                    return Err(err.into());
                }
                msg => return Err(out_of_order(msg)),
            }
        }
    }

    async fn wait_ready(&mut self) -> Result<(), Error> {
        loop {
            match self.message().await? {
                ServerMessage::ReadyForCommand(ready) => {
                    self.transaction_state = ready.transaction_state;
                    return Ok(());
                }
                ServerMessage::ServerKeyData(key_data) => {
                    self.server_key_data = Some(key_data.data);
                }
                ServerMessage::ParameterStatus(par) => {
                    let name = String::from_utf8_lossy(&par.name).into_owned();
                    self.server_params.insert(name, par.value);
                }
                msg => log::warn!("unsolicited message {:?}", msg),
            }
        }
    }

    async fn sync_ready(&mut self) -> Result<(), Error> {
        self.send(&[ClientMessage::Sync]).await?;
        self.wait_ready().await
    }

    fn start(&mut self) -> Result<(), Error> {
        if self.dirty {
            return Err(ClientInconsistentError::with_message(
                "connection is in an inconsistent state, please reconnect",
            ));
        }
        self.dirty = true;
        Ok(())
    }

    fn end_clean(&mut self) {
        self.dirty = false;
    }

    async fn send<'x>(
        &mut self,
        messages: impl IntoIterator<Item = &'x ClientMessage>,
    ) -> Result<(), Error> {
        reader::send_messages(&mut self.stream, &mut self.out_buf, &self.proto, messages)
            .await
    }

    async fn message(&mut self) -> Result<ServerMessage, Error> {
        reader::wait_message(
            &mut self.stream,
            &mut self.in_buf,
            self.call_timeout,
            &self.proto,
        )
        .await
    }
}

fn check_cardinality(expected: Cardinality, actual: Cardinality) -> Result<(), Error> {
    if !expected.is_optional() && actual == Cardinality::NoResult {
        return Err(CardinalityViolationError::with_message(
            "statement declared to return exactly one row produces no result",
        ));
    }
    Ok(())
}
