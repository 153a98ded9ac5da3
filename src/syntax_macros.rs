//! Declarative construction macros.
//!
//! These push contract-list and composition construction to the call site so
//! the core never needs to decompose types at runtime.

// =============================================================================
// contracts! - Build a contract list
// =============================================================================

/// Build a [`Contracts`](crate::Contracts) list from contract types.
///
/// Subject and capability types are inferred from the call that consumes the list.
/// A trailing `primary` keyword appends the reserved primary marker.
///
/// # Example
///
/// ```ignore
/// composer.add_as_all(Standard, contracts![dyn Priced, dyn Shippable])?;
///
/// // Concrete type, one contract and the primary marker
/// composer.add_as_all(Checkout, contracts![Checkout, dyn Priced; primary])?;
/// ```
#[macro_export]
macro_rules! contracts {
    () => {
        $crate::Contracts::new()
    };
    ($($contract:ty),* ; primary) => {
        $crate::Contracts::new()$(.with::<$contract>())*.primary()
    };
    ($($contract:ty),+ $(,)?) => {
        $crate::Contracts::new()$(.with::<$contract>())+
    };
}

// =============================================================================
// compose! - Build a composition in one expression
// =============================================================================

/// Build a [`Composition`](crate::Composition) from a subject and capabilities.
///
/// Evaluates to `Result<Composition<S>, ComposeError>`. Each capability is added
/// with [`Composer::add`](crate::Composer::add); `cap => [K, ..]` registers it
/// under the listed contracts instead.
///
/// # Example
///
/// ```ignore
/// let composition = compose!(order => {
///     Audit::new(),
///     Standard => [dyn Priced, dyn Shippable],
/// })?;
/// ```
#[macro_export]
macro_rules! compose {
    (@add $composer:ident;) => {};
    (@add $composer:ident; $cap:expr => [$($contract:ty),+ $(,)?] $(, $($rest:tt)*)?) => {
        $composer.add_as_all($cap, $crate::contracts![$($contract),+])?;
        $($crate::compose!(@add $composer; $($rest)*);)?
    };
    (@add $composer:ident; $cap:expr $(, $($rest:tt)*)?) => {
        $composer.add($cap)?;
        $($crate::compose!(@add $composer; $($rest)*);)?
    };

    ($subject:expr => { $($body:tt)* }) => {
        (|| -> $crate::Result<_> {
            let mut __composer = $crate::Composer::new($subject);
            $crate::compose!(@add __composer; $($body)*);
            __composer.build()
        })()
    };
}
