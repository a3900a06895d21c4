use serde::Serialize;

use crate::model::User;
use crate::session::is_admin;
use crate::SupplyOffice;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Login,
    Signup,
    Dashboard,
    Inventory,
    Uniforms,
    OfficeSupplies,
    SchoolEquipment,
    Request,
    PendingRequests,
    Reports,
    Logs,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = trimmed.trim_end_matches('/');
        Some(match trimmed {
            "/login" => Self::Login,
            "/signup" => Self::Signup,
            "" | "/dashboard" => Self::Dashboard,
            "/inventory" => Self::Inventory,
            "/uniforms" => Self::Uniforms,
            "/office-supplies" => Self::OfficeSupplies,
            "/school-equipment" => Self::SchoolEquipment,
            "/request" => Self::Request,
            "/pending-requests" => Self::PendingRequests,
            "/reports" => Self::Reports,
            "/logs" => Self::Logs,
            _ => return None,
        })
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Signup => "/signup",
            Self::Dashboard => "/dashboard",
            Self::Inventory => "/inventory",
            Self::Uniforms => "/uniforms",
            Self::OfficeSupplies => "/office-supplies",
            Self::SchoolEquipment => "/school-equipment",
            Self::Request => "/request",
            Self::PendingRequests => "/pending-requests",
            Self::Reports => "/reports",
            Self::Logs => "/logs",
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }

    pub fn admin_only(self) -> bool {
        matches!(self, Self::PendingRequests | Self::Reports | Self::Logs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RouteDecision {
    Allow { route: Route },
    Redirect { to: &'static str },
}

pub fn guard(path: &str, user: Option<&User>) -> RouteDecision {
    let Some(route) = Route::parse(path) else {
        let to = if user.is_some() {
            Route::Dashboard.path()
        } else {
            Route::Login.path()
        };
        return RouteDecision::Redirect { to };
    };
    match user {
        None if route.is_public() => RouteDecision::Allow { route },
        None => RouteDecision::Redirect {
            to: Route::Login.path(),
        },
        Some(_) if route.is_public() => RouteDecision::Redirect {
            to: Route::Dashboard.path(),
        },
        Some(user) if route.admin_only() && !is_admin(user) => RouteDecision::Redirect {
            to: Route::Dashboard.path(),
        },
        Some(_) => {
            if path.trim_end_matches('/').is_empty() {
                RouteDecision::Redirect {
                    to: Route::Dashboard.path(),
                }
            } else {
                RouteDecision::Allow { route }
            }
        }
    }
}

impl SupplyOffice {
    pub fn resolve_route(&self, path: &str) -> RouteDecision {
        guard(path, self.current_user().as_ref())
    }
}
