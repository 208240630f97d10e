use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Path, State as AxumState,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use threenames::{
    ClientMsg, GameConfig, GameError, GameRegistry, GameSnapshot, Player, RateDelay, ServerMsg,
};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    registry: GameRegistry,
}

#[derive(Debug, Serialize, Deserialize)]
struct NewGameResponse {
    code: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: GameError) -> ApiError {
    let status = match &e {
        GameError::Failure(_) => StatusCode::BAD_REQUEST,
        GameError::NotFound(_) => StatusCode::NOT_FOUND,
        GameError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        GameError::Internal(_) => {
            tracing::error!(%e, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse { error: e.user_message() }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("threenames=info,tower_http=info")),
        )
        .init();

    let config = GameConfig::from_env();
    let registry = GameRegistry::new(config, RateDelay::default());
    let _reaper = registry.spawn_reaper();

    let app = Router::new()
        .route("/new", get(new_game))
        .route("/game", get(connect))
        .route("/game/{code}", get(game_state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry });

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080u16);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "threenames server listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, %e, "could not bind");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(%e, "server stopped");
    }
}

async fn new_game(
    AxumState(state): AxumState<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Result<Json<NewGameResponse>, ApiError> {
    let game = state
        .registry
        .create(&remote.ip().to_string())
        .map_err(api_error)?;
    Ok(Json(NewGameResponse {
        code: game.code().to_string(),
    }))
}

async fn game_state(
    AxumState(state): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<GameSnapshot>, ApiError> {
    let game = state.registry.find(&code).map_err(api_error)?;
    game.snapshot().map(Json).map_err(api_error)
}

async fn connect(AxumState(state): AxumState<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry))
        .into_response()
}

fn encode(msg: &ServerMsg) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(%e, "could not encode message");
            None
        }
    }
}

/// Wait for the join frame, then pump frames both ways until the socket closes.
async fn handle_socket(socket: WebSocket, registry: GameRegistry) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMsg>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Some(frame) = encode(&msg) else { continue };
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut joined: Option<Arc<Player>> = None;
    while let Some(Ok(frame)) = stream.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        if let Some(player) = &joined {
            player.receive(text.as_str());
            continue;
        }

        let request = match ClientMsg::parse(text.as_str()) {
            Ok(ClientMsg::Join(request)) => request,
            Ok(ClientMsg::Pong) => continue,
            Ok(_) => {
                let _ = tx.send(ServerMsg::Error("Join a game first".to_string()));
                continue;
            }
            Err(e) => {
                let _ = tx.send(ServerMsg::Error(e.user_message()));
                continue;
            }
        };

        match registry.join(&request.code, &request.name, tx.clone()).await {
            Ok(player) => {
                if let Ok(game) = registry.find(&request.code) {
                    if let Err(e) = game.send_state(&player) {
                        tracing::error!(%e, "could not send initial state");
                    }
                }
                joined = Some(player);
            }
            Err(e) => {
                if e.is_internal() {
                    tracing::error!(%e, "join failed");
                }
                let _ = tx.send(ServerMsg::Error(e.user_message()));
            }
        }
    }

    // A player who reconnected elsewhere keeps their seat.
    if let Some(player) = joined.filter(|p| p.is_attached_to(&tx)) {
        tracing::info!(player = %player.name(), "connection closed");
        if let Some(game) = player.current_game() {
            if let Err(e) = game.remove_player(player.name()) {
                tracing::error!(%e, "could not remove player");
            }
        }
    }
    drop(tx);
    writer.abort();
}
