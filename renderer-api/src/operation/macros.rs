//! Declarative macros for renderer operations
//!
//! An operation definition names the action, its service, the request fields
//! with their wire argument names, and (optionally) the response fields with
//! the element each one is read from. The macros generate the request and
//! response structs and the [`UPnPOperation`](crate::operation::UPnPOperation)
//! implementation. `InstanceID` is always sent first.
//!
//! Callers need `paste::paste` and `xmltree` in scope.

/// Define an operation whose reply carries no fields
///
/// # Example
/// ```rust,ignore
/// define_upnp_operation! {
///     operation: PlayOperation,
///     action: "Play",
///     service: AVTransport,
///     request: {
///         speed: String => "Speed",
///     },
/// }
/// ```
#[macro_export]
macro_rules! define_upnp_operation {
    (
        operation: $op_struct:ident,
        action: $action:literal,
        service: $service:ident,
        request: {
            $($field:ident: $field_type:ty => $wire:literal),* $(,)?
        }
        $(, validate: |$v_req:ident| $validate_expr:expr)? $(,)?
    ) => {
        paste! {
            #[derive(Clone, Debug, PartialEq)]
            pub struct [<$op_struct Request>] {
                $(pub $field: $field_type,)*
                pub instance_id: u32,
            }

            impl $crate::operation::Validate for [<$op_struct Request>] {
                $(fn validate(&self) -> Result<(), $crate::operation::ValidationError> {
                    let $v_req = self;
                    $validate_expr
                })?
            }

            pub struct $op_struct;

            impl $crate::operation::UPnPOperation for $op_struct {
                type Request = [<$op_struct Request>];
                type Response = ();

                const SERVICE: $crate::ServiceKind = $crate::ServiceKind::$service;
                const ACTION: &'static str = $action;

                fn build_params(
                    request: &Self::Request,
                ) -> Result<$crate::operation::ActionParams, $crate::operation::ValidationError> {
                    $crate::operation::Validate::validate(request)?;
                    Ok(vec![
                        ("InstanceID", $crate::ParamValue::from(request.instance_id)),
                        $(($wire, $crate::ParamValue::from(request.$field.clone())),)*
                    ])
                }

                fn parse_response(_xml: &xmltree::Element) -> Result<(), $crate::ControlError> {
                    Ok(())
                }
            }
        }
    };
}

/// Define an operation whose reply fields are read into a response struct
///
/// # Example
/// ```rust,ignore
/// define_operation_with_response! {
///     operation: GetVolumeOperation,
///     action: "GetVolume",
///     service: RenderingControl,
///     request: {
///         channel: String => "Channel",
///     },
///     response: GetVolumeResponse {
///         current_volume: f64 => "CurrentVolume",
///     },
/// }
/// ```
#[macro_export]
macro_rules! define_operation_with_response {
    (
        operation: $op_struct:ident,
        action: $action:literal,
        service: $service:ident,
        request: {
            $($field:ident: $field_type:ty => $wire:literal),* $(,)?
        },
        response: $response_struct:ident {
            $($resp_field:ident: $resp_type:ty => $xml_name:literal),* $(,)?
        }
        $(, validate: |$v_req:ident| $validate_expr:expr)? $(,)?
    ) => {
        paste! {
            #[derive(Clone, Debug, PartialEq)]
            pub struct [<$op_struct Request>] {
                $(pub $field: $field_type,)*
                pub instance_id: u32,
            }

            impl $crate::operation::Validate for [<$op_struct Request>] {
                $(fn validate(&self) -> Result<(), $crate::operation::ValidationError> {
                    let $v_req = self;
                    $validate_expr
                })?
            }

            #[derive(Clone, Debug, PartialEq)]
            pub struct $response_struct {
                $(pub $resp_field: $resp_type,)*
            }

            pub struct $op_struct;

            impl $crate::operation::UPnPOperation for $op_struct {
                type Request = [<$op_struct Request>];
                type Response = $response_struct;

                const SERVICE: $crate::ServiceKind = $crate::ServiceKind::$service;
                const ACTION: &'static str = $action;

                fn build_params(
                    request: &Self::Request,
                ) -> Result<$crate::operation::ActionParams, $crate::operation::ValidationError> {
                    $crate::operation::Validate::validate(request)?;
                    Ok(vec![
                        ("InstanceID", $crate::ParamValue::from(request.instance_id)),
                        $(($wire, $crate::ParamValue::from(request.$field.clone())),)*
                    ])
                }

                fn parse_response(xml: &xmltree::Element) -> Result<Self::Response, $crate::ControlError> {
                    Ok($response_struct {
                        $($resp_field: $crate::operation::response_field(xml, $xml_name)?,)*
                    })
                }
            }
        }
    };
}
