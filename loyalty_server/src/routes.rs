//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they authenticate the caller, call into the ledger API
//! and translate the outcome into a status code.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Password hashing is the one CPU-heavy step, and it is short enough
//! to run inline; everything else is I/O and is awaited.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::{
    ledger_objects::{History, SubmissionOutcome},
    AccountApi,
    AccountManagement,
    AuthApi,
    AuthManagement,
    LedgerApiError,
    LedgerDatabase,
    OrderFlowApi,
    WithdrawalApi,
};

use crate::{
    auth::{SessionSigner, SessionUser},
    data_objects::{Credentials, JsonResponse, OrderResponse, WithdrawRequest, WithdrawalResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(register => Post "/user/register" impl AuthManagement);
/// Creates an account and logs the new user in.
///
/// Responds with `409` if the login is taken, and `400` if the login or password is missing.
pub async fn register<B: AuthManagement>(
    body: web::Json<Credentials>,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<SessionSigner>,
) -> Result<HttpResponse, ServerError> {
    let Credentials { login, password } = body.into_inner();
    debug!("💻️ POST register for '{login}'");
    let account = api.register(&login, &password).await.map_err(|e| match e {
        LedgerApiError::InvalidInput(msg) => ServerError::InvalidRequestBody(msg),
        e => ServerError::from(e),
    })?;
    Ok(HttpResponse::Ok()
        .cookie(signer.session_cookie(account.id))
        .json(JsonResponse::success(format!("Registered {}", account.login))))
}

route!(login => Post "/user/login" impl AuthManagement);
pub async fn login<B: AuthManagement>(
    body: web::Json<Credentials>,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<SessionSigner>,
) -> Result<HttpResponse, ServerError> {
    let Credentials { login, password } = body.into_inner();
    debug!("💻️ POST login for '{login}'");
    let account = api.authenticate(&login, &password).await?;
    Ok(HttpResponse::Ok()
        .cookie(signer.session_cookie(account.id))
        .json(JsonResponse::success(format!("Logged in as {}", account.login))))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(submit_order => Post "/user/orders" impl LedgerDatabase);
/// Submits an order number, sent as the plain text body.
///
/// * `202` - the number is new and has been queued for reconciliation.
/// * `200` - the caller has already submitted this number.
/// * `409` - the number belongs to another user.
/// * `422` - the number is not a valid order number.
pub async fn submit_order<B: LedgerDatabase>(
    user: SessionUser,
    body: String,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST order for user #{}", user.user_id);
    match api.submit_order(user.user_id, &body).await? {
        SubmissionOutcome::Accepted(order) => Ok(HttpResponse::Accepted().json(OrderResponse::from(order))),
        SubmissionOutcome::AlreadyOwnedBySelf(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
    }
}

route!(my_orders => Get "/user/orders" impl AccountManagement);
/// The caller's orders, oldest first, or `204` if there are none.
pub async fn my_orders<B: AccountManagement>(
    user: SessionUser,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for user #{}", user.user_id);
    let response = match api.orders(user.user_id).await? {
        History::NoContent => HttpResponse::NoContent().finish(),
        History::Records(orders) => {
            HttpResponse::Ok().json(orders.into_iter().map(OrderResponse::from).collect::<Vec<_>>())
        },
    };
    Ok(response)
}

//----------------------------------------------   Balance  ----------------------------------------------------
route!(my_balance => Get "/user/balance" impl AccountManagement);
pub async fn my_balance<B: AccountManagement>(
    user: SessionUser,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET balance for user #{}", user.user_id);
    let balance = api.balance(user.user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(withdraw => Post "/user/balance/withdraw" impl LedgerDatabase);
/// Spends `sum` points against the identifier `order`.
///
/// Responds with `402` if the balance does not cover the sum, and `422` if the identifier fails the Luhn check or the
/// sum is not positive.
pub async fn withdraw<B: LedgerDatabase>(
    user: SessionUser,
    body: web::Json<WithdrawRequest>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let WithdrawRequest { order, sum } = body.into_inner();
    debug!("💻️ POST withdraw {sum} for user #{} against {order}", user.user_id);
    let withdrawal = api.withdraw(user.user_id, &order, sum).await?;
    Ok(HttpResponse::Ok().json(WithdrawalResponse::from(withdrawal)))
}

route!(my_withdrawals => Get "/user/balance/withdrawals" impl AccountManagement);
pub async fn my_withdrawals<B: AccountManagement>(
    user: SessionUser,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET withdrawals for user #{}", user.user_id);
    let response = match api.withdrawals(user.user_id).await? {
        History::NoContent => HttpResponse::NoContent().finish(),
        History::Records(withdrawals) => {
            HttpResponse::Ok().json(withdrawals.into_iter().map(WithdrawalResponse::from).collect::<Vec<_>>())
        },
    };
    Ok(response)
}
