//! gRPC service implementation
//!
//! This module implements the OddsService gRPC handlers using tonic.
//! The proto definitions are compiled at build time via build.rs.

use crate::error::{AppError, CoefficientError};
use crate::models::MarketDetails;
use crate::services::{UpdateGateway, UpdateRequest, UserService};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info};

pub mod proto {
    tonic::include_proto!("odds");

    /// File descriptor set for gRPC reflection
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/odds_descriptor.bin"));
}

use proto::odds_service_server::{OddsService, OddsServiceServer};
use proto::{
    CoefficientChange, GetMarketRequest, LoginRequest, LoginResponse, MarketResponse,
    RegisterUserRequest, RegisterUserResponse, UpdateCoefficientRequest,
    UpdateCoefficientResponse,
};

/// gRPC service implementation
pub struct OddsGrpcService {
    gateway: Arc<UpdateGateway>,
    users: Arc<UserService>,
}

impl OddsGrpcService {
    /// Create a new gRPC service
    pub fn new(gateway: Arc<UpdateGateway>, users: Arc<UserService>) -> Self {
        Self { gateway, users }
    }

    /// Create a tonic server for this service
    pub fn into_server(self) -> OddsServiceServer<Self> {
        OddsServiceServer::new(self)
    }

    /// Convert AppError to tonic Status
    fn to_status(err: AppError) -> Status {
        match err {
            AppError::NotFound(msg) => Status::not_found(msg),
            AppError::Unauthorized(msg) => Status::unauthenticated(msg),
            AppError::Validation(msg) => Status::invalid_argument(msg),
            AppError::BusinessLogic(msg) => Status::failed_precondition(msg),
            AppError::Database(_) | AppError::Sqlx(_) => {
                error!("Database error: {:?}", err);
                Status::internal("Database error")
            }
            _ => {
                error!("Internal error: {:?}", err);
                Status::internal("Internal server error")
            }
        }
    }

    /// Database ids are BIGSERIAL; the wire carries uint32
    fn wire_id(id: i64) -> Result<u32, Status> {
        u32::try_from(id).map_err(|_| Status::internal(format!("Id {} exceeds wire range", id)))
    }

    fn market_response(details: MarketDetails) -> Result<MarketResponse, Status> {
        let MarketDetails {
            market,
            event,
            history,
        } = details;

        let history = history
            .into_iter()
            .map(|entry| {
                Ok(CoefficientChange {
                    old_value: entry.old_value,
                    new_value: entry.new_value,
                    changed_by_id: Self::wire_id(entry.changed_by_id)?,
                    timestamp: entry.timestamp.and_utc().timestamp(),
                })
            })
            .collect::<Result<Vec<_>, Status>>()?;

        Ok(MarketResponse {
            market_id: Self::wire_id(market.id)?,
            name: market.name,
            market_type: market.market_type,
            event_id: Self::wire_id(event.id)?,
            event_name: event.name,
            current_coefficient: market.current_coefficient,
            previous_coefficient: market.previous_coefficient,
            min_coefficient: market.min_coefficient,
            max_coefficient: market.max_coefficient,
            is_active: market.is_active,
            last_updated: market.last_updated.and_utc().timestamp(),
            history,
        })
    }
}

#[tonic::async_trait]
impl OddsService for OddsGrpcService {
    /// Update a market coefficient. Declines are normal responses with
    /// `success = false`.
    async fn update_coefficient(
        &self,
        request: Request<UpdateCoefficientRequest>,
    ) -> Result<Response<UpdateCoefficientResponse>, Status> {
        let req = request.into_inner();
        info!(
            "UpdateCoefficient request: market={}, coefficient={}, user={}",
            req.market_id, req.new_coefficient, req.user_id
        );

        let report = self
            .gateway
            .handle(UpdateRequest {
                market_id: i64::from(req.market_id),
                new_coefficient: req.new_coefficient,
                user_id: i64::from(req.user_id),
            })
            .await;

        let message = report.message();
        let response = match report.commit {
            Ok(update) => UpdateCoefficientResponse {
                success: true,
                message,
                market_id: req.market_id,
                old_coefficient: update.old_coefficient,
                new_coefficient: update.new_coefficient,
                updated_at: update.updated_at.and_utc().timestamp(),
            },
            Err(_) => UpdateCoefficientResponse {
                success: false,
                message,
                market_id: req.market_id,
                ..Default::default()
            },
        };

        Ok(Response::new(response))
    }

    /// Fetch a market with its event and history
    async fn get_market(
        &self,
        request: Request<GetMarketRequest>,
    ) -> Result<Response<MarketResponse>, Status> {
        let req = request.into_inner();
        info!("GetMarket request: market={}", req.market_id);

        let details = self
            .gateway
            .store()
            .get_market_with_history(i64::from(req.market_id))
            .await
            .map_err(|e| match e {
                CoefficientError::MarketNotFound(_) => Status::not_found(e.to_string()),
                other => {
                    error!("Failed to load market {}: {}", req.market_id, other);
                    Status::internal("Database error")
                }
            })?;

        Ok(Response::new(Self::market_response(details)?))
    }

    /// Register a user. Invalid or taken usernames are declined in-band.
    async fn register_user(
        &self,
        request: Request<RegisterUserRequest>,
    ) -> Result<Response<RegisterUserResponse>, Status> {
        let req = request.into_inner();
        info!("RegisterUser request: username={}", req.username);

        match self.users.register_user(&req.username, &req.password).await {
            Ok(user) => Ok(Response::new(RegisterUserResponse {
                success: true,
                message: "User created".to_string(),
                user_id: Self::wire_id(user.id)?,
            })),
            Err(AppError::Validation(msg)) | Err(AppError::BusinessLogic(msg)) => {
                Ok(Response::new(RegisterUserResponse {
                    success: false,
                    message: msg,
                    user_id: 0,
                }))
            }
            Err(e) => Err(Self::to_status(e)),
        }
    }

    /// Check credentials. Wrong or missing credentials are declined in-band.
    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        info!("Login request: username={}", req.username);

        match self.users.authenticate(&req.username, &req.password).await {
            Ok(user) => Ok(Response::new(LoginResponse {
                success: true,
                message: "Login successful".to_string(),
                user_id: Self::wire_id(user.id)?,
            })),
            Err(AppError::Unauthorized(msg)) => Ok(Response::new(LoginResponse {
                success: false,
                message: msg,
                user_id: 0,
            })),
            Err(e) => Err(Self::to_status(e)),
        }
    }
}
